use sea_orm::entity::prelude::*;

/// Derived commission record, one-to-one with a commissionable order.
///
/// `order_id` deliberately carries no foreign key: rows imported from the
/// legacy system can reference orders that no longer exist, and reporting
/// skips them instead of failing.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "commission")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique, indexed)]
    pub order_id: Uuid,
    pub commission_due_cents: i64,
    /// Materialized sum of the payment ledger (or the legacy scalar when
    /// the ledger is empty).
    pub amount_paid_cents: i64,
    /// max(due - paid, 0); never negative.
    pub amount_remaining_cents: i64,
    pub pay_status: PayStatus,
    /// Legacy scalar paid date; only meaningful when the ledger is empty.
    pub paid_on: Option<Date>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::payment::Entity")]
    Payment,
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "pay_status")]
pub enum PayStatus {
    #[sea_orm(string_value = "UNPAID")]
    Unpaid,
    #[sea_orm(string_value = "PARTIAL")]
    Partial,
    #[sea_orm(string_value = "PAID")]
    Paid,
}

impl PayStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PayStatus::Unpaid => "UNPAID",
            PayStatus::Partial => "PARTIAL",
            PayStatus::Paid => "PAID",
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
