use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Brand {
    Table,
    Id,
    Name,
    CommissionBps,
    Website,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Account {
    Table,
    Id,
    Name,
    City,
    Region,
    NotesMd,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Season {
    Table,
    Id,
    Name,
    StartsOn,
    EndsOn,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SalesOrder {
    Table,
    Id,
    AccountId,
    BrandId,
    SeasonId,
    TotalCents,
    Stage,
    CommissionOverrideBps,
    OrderedOn,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Commission {
    Table,
    Id,
    OrderId,
    CommissionDueCents,
    AmountPaidCents,
    AmountRemainingCents,
    PayStatus,
    PaidOn,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Payment {
    Table,
    Id,
    CommissionId,
    AmountCents,
    PaidOn,
    Position,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Todo {
    Table,
    Id,
    Title,
    NotesMd,
    Status,
    DueOn,
    Assignee,
    AccountId,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StageMeta {
    Table,
    Key,
    DisplayName,
    SortOrder,
    IsExcluded,
}

#[derive(DeriveIden)]
enum OrderStageEnum {
    #[sea_orm(iden = "order_stage")]
    Table,
}

#[derive(DeriveIden)]
enum PayStatusEnum {
    #[sea_orm(iden = "pay_status")]
    Table,
}

#[derive(DeriveIden)]
enum TodoStatusEnum {
    #[sea_orm(iden = "todo_status")]
    Table,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

const ORDER_STAGE_VALUES: &[&str] = &["OPEN", "WON", "LOST", "VOID"];
const PAY_STATUS_VALUES: &[&str] = &["UNPAID", "PARTIAL", "PAID"];
const TODO_STATUS_VALUES: &[&str] = &["OPEN", "DONE"];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, values) in [
            ("order_stage", ORDER_STAGE_VALUES),
            ("pay_status", PAY_STATUS_VALUES),
            ("todo_status", TODO_STATUS_VALUES),
        ] {
            let create_enum_sql = format!(
                "DO $$ BEGIN IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = '{}') THEN CREATE TYPE {} AS ENUM ({}); END IF; END $$;",
                name,
                name,
                values
                    .iter()
                    .map(|v| format!("'{}'", v))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            manager
                .get_connection()
                .execute_unprepared(&create_enum_sql)
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(Brand::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Brand::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Brand::Name).string_len(256).not_null())
                    .col(
                        ColumnDef::new(Brand::CommissionBps)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Brand::Website).string_len(512))
                    .col(
                        ColumnDef::new(Brand::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .col(
                        ColumnDef::new(Brand::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_brand_name")
                    .table(Brand::Table)
                    .col(Brand::Name)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Account::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Account::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Account::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Account::City).string_len(128))
                    .col(ColumnDef::new(Account::Region).string_len(128))
                    .col(ColumnDef::new(Account::NotesMd).text())
                    .col(
                        ColumnDef::new(Account::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .col(
                        ColumnDef::new(Account::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_account_name")
                    .table(Account::Table)
                    .col(Account::Name)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Season::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Season::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Season::Name).string_len(128).not_null())
                    .col(ColumnDef::new(Season::StartsOn).date())
                    .col(ColumnDef::new(Season::EndsOn).date())
                    .col(
                        ColumnDef::new(Season::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .col(
                        ColumnDef::new(Season::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SalesOrder::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesOrder::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(SalesOrder::AccountId).uuid().not_null())
                    .col(ColumnDef::new(SalesOrder::BrandId).uuid().not_null())
                    .col(ColumnDef::new(SalesOrder::SeasonId).uuid())
                    .col(
                        ColumnDef::new(SalesOrder::TotalCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SalesOrder::Stage)
                            .custom(OrderStageEnum::Table)
                            .not_null()
                            .default(Expr::cust("'OPEN'::order_stage")),
                    )
                    .col(ColumnDef::new(SalesOrder::CommissionOverrideBps).integer())
                    .col(ColumnDef::new(SalesOrder::OrderedOn).date())
                    .col(
                        ColumnDef::new(SalesOrder::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .col(
                        ColumnDef::new(SalesOrder::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_account")
                            .from(SalesOrder::Table, SalesOrder::AccountId)
                            .to(Account::Table, Account::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_brand")
                            .from(SalesOrder::Table, SalesOrder::BrandId)
                            .to(Brand::Table, Brand::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_season")
                            .from(SalesOrder::Table, SalesOrder::SeasonId)
                            .to(Season::Table, Season::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_order_brand")
                    .table(SalesOrder::Table)
                    .col(SalesOrder::BrandId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_order_season")
                    .table(SalesOrder::Table)
                    .col(SalesOrder::SeasonId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_order_stage")
                    .table(SalesOrder::Table)
                    .col(SalesOrder::Stage)
                    .to_owned(),
            )
            .await?;

        // No FK from commission.order_id to sales_order: legacy imports can
        // leave orphaned commission rows and reporting filters them out.
        manager
            .create_table(
                Table::create()
                    .table(Commission::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Commission::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Commission::OrderId).uuid().not_null())
                    .col(
                        ColumnDef::new(Commission::CommissionDueCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Commission::AmountPaidCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Commission::AmountRemainingCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Commission::PayStatus)
                            .custom(PayStatusEnum::Table)
                            .not_null()
                            .default(Expr::cust("'UNPAID'::pay_status")),
                    )
                    .col(ColumnDef::new(Commission::PaidOn).date())
                    .col(
                        ColumnDef::new(Commission::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .col(
                        ColumnDef::new(Commission::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_commission_order")
                    .table(Commission::Table)
                    .col(Commission::OrderId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payment::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Payment::CommissionId).uuid().not_null())
                    .col(
                        ColumnDef::new(Payment::AmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Payment::PaidOn).date())
                    .col(ColumnDef::new(Payment::Position).integer().not_null())
                    .col(
                        ColumnDef::new(Payment::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_commission")
                            .from(Payment::Table, Payment::CommissionId)
                            .to(Commission::Table, Commission::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_payment_commission")
                    .table(Payment::Table)
                    .col(Payment::CommissionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Todo::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Todo::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Todo::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Todo::NotesMd).text())
                    .col(
                        ColumnDef::new(Todo::Status)
                            .custom(TodoStatusEnum::Table)
                            .not_null()
                            .default(Expr::cust("'OPEN'::todo_status")),
                    )
                    .col(ColumnDef::new(Todo::DueOn).date())
                    .col(ColumnDef::new(Todo::Assignee).string_len(256))
                    .col(ColumnDef::new(Todo::AccountId).uuid())
                    .col(ColumnDef::new(Todo::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Todo::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .col(
                        ColumnDef::new(Todo::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_todo_account")
                            .from(Todo::Table, Todo::AccountId)
                            .to(Account::Table, Account::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StageMeta::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StageMeta::Key)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(StageMeta::DisplayName)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StageMeta::SortOrder).small_integer().not_null())
                    .col(
                        ColumnDef::new(StageMeta::IsExcluded)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StageMeta::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Todo::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Commission::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SalesOrder::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Season::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Account::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Brand::Table).to_owned())
            .await?;
        manager
            .get_connection()
            .execute_unprepared("DROP TYPE IF EXISTS todo_status; DROP TYPE IF EXISTS pay_status; DROP TYPE IF EXISTS order_stage;")
            .await?;
        Ok(())
    }
}
