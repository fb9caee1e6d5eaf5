use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "sales_order")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub account_id: Uuid,
    #[sea_orm(indexed)]
    pub brand_id: Uuid,
    #[sea_orm(indexed)]
    pub season_id: Option<Uuid>,
    /// Order total in cents; never negative.
    pub total_cents: i64,
    pub stage: Stage,
    /// Order-level commission rate override in basis points.
    /// Present (including an explicit 0) wins over the brand default.
    pub commission_override_bps: Option<i32>,
    pub ordered_on: Option<Date>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
    #[sea_orm(
        belongs_to = "super::brand::Entity",
        from = "Column::BrandId",
        to = "super::brand::Column::Id"
    )]
    Brand,
    #[sea_orm(
        belongs_to = "super::season::Entity",
        from = "Column::SeasonId",
        to = "super::season::Column::Id"
    )]
    Season,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::brand::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Brand.def()
    }
}

impl Related<super::season::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Season.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "order_stage")]
pub enum Stage {
    #[sea_orm(string_value = "OPEN")]
    Open,
    #[sea_orm(string_value = "WON")]
    Won,
    #[sea_orm(string_value = "LOST")]
    Lost,
    #[sea_orm(string_value = "VOID")]
    Void,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Open => "OPEN",
            Stage::Won => "WON",
            Stage::Lost => "LOST",
            Stage::Void => "VOID",
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
