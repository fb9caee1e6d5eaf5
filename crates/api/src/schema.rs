use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_graphql::{
    Context, EmptySubscription, Enum, Error, ErrorExtensions, InputObject, MaybeUndefined, Object,
    Schema, SimpleObject, ID,
};
use chrono::{DateTime, NaiveDate, Utc};
use entity::{account, brand, commission, payment, sales_order, season, stage_meta, todo};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use tracing::info_span;
use uuid::Uuid;

use crate::commission::{
    classify, commission_due_cents, effective_rate_bps, recompute, validate_payment_cents,
    validate_rate_bps, validate_total_cents, CommissionError, Ledger, LedgerEntry,
};
use crate::report::{payment_report, summarize, ReportFilter};

pub struct AppSchema(pub Schema<QueryRoot, MutationRoot, EmptySubscription>);

pub fn build_schema(db: Arc<DatabaseConnection>) -> AppSchema {
    let schema = Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(db)
        .finish();
    AppSchema(schema)
}

pub struct QueryRoot;
pub struct MutationRoot;

const MAX_PAGE: i32 = 200;

#[Object]
impl QueryRoot {
    async fn sales(&self) -> SalesQuery {
        SalesQuery
    }
}

#[Object]
impl MutationRoot {
    async fn sales(&self) -> SalesMutation {
        SalesMutation
    }
}

#[derive(Default)]
pub struct SalesQuery;

#[derive(Default)]
pub struct SalesMutation;

#[Object]
impl SalesQuery {
    async fn brands(
        &self,
        ctx: &Context<'_>,
        first: Option<i32>,
        offset: Option<i32>,
        q: Option<String>,
    ) -> async_graphql::Result<Vec<BrandNode>> {
        let db = database(ctx)?;
        let limit = first.unwrap_or(50).clamp(1, MAX_PAGE) as u64;
        let skip = offset.unwrap_or(0).max(0) as u64;
        let mut query = brand::Entity::find();
        if let Some(filter) = sanitize_optional_filter(q) {
            let pattern = format!("%{}%", filter);
            query = query.filter(brand::Column::Name.like(pattern));
        }
        let records = query
            .order_by_asc(brand::Column::Name)
            .limit(limit)
            .offset(skip)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(records.into_iter().map(BrandNode::from).collect())
    }

    async fn brand(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<BrandNode>> {
        let db = database(ctx)?;
        let brand_id = parse_uuid(&id)?;
        let record = brand::Entity::find_by_id(brand_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(record.map(BrandNode::from))
    }

    async fn accounts(
        &self,
        ctx: &Context<'_>,
        first: Option<i32>,
        offset: Option<i32>,
        q: Option<String>,
    ) -> async_graphql::Result<Vec<AccountNode>> {
        let db = database(ctx)?;
        let limit = first.unwrap_or(50).clamp(1, MAX_PAGE) as u64;
        let skip = offset.unwrap_or(0).max(0) as u64;
        let mut query = account::Entity::find();
        if let Some(filter) = sanitize_optional_filter(q) {
            let pattern = format!("%{}%", filter);
            query = query.filter(
                Condition::any()
                    .add(account::Column::Name.like(pattern.clone()))
                    .add(account::Column::City.like(pattern)),
            );
        }
        let records = query
            .order_by_asc(account::Column::Name)
            .limit(limit)
            .offset(skip)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(records.into_iter().map(AccountNode::from).collect())
    }

    async fn seasons(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<SeasonNode>> {
        let db = database(ctx)?;
        let records = season::Entity::find()
            .order_by_desc(season::Column::StartsOn)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(records.into_iter().map(SeasonNode::from).collect())
    }

    async fn orders(
        &self,
        ctx: &Context<'_>,
        filter: Option<OrderFilter>,
        first: Option<i32>,
        offset: Option<i32>,
    ) -> async_graphql::Result<Vec<OrderNode>> {
        let db = database(ctx)?;
        let requested = first.unwrap_or(50);
        if requested < 0 {
            return Err(validation_error("first must be non-negative"));
        }
        if requested > MAX_PAGE {
            return Err(error_with_code(
                "LIMIT_EXCEEDED",
                format!("first cannot exceed {}", MAX_PAGE),
            ));
        }
        let skip = offset.unwrap_or(0).max(0) as u64;
        let span = info_span!(
            "sales.orders",
            first = requested,
            has_filter = filter.is_some()
        );
        let _guard = span.enter();

        let mut query = sales_order::Entity::find();
        if let Some(filter) = filter {
            if let Some(brand_id) = parse_optional_id("brandId", &filter.brand_id)? {
                query = query.filter(sales_order::Column::BrandId.eq(brand_id));
            }
            if let Some(account_id) = parse_optional_id("accountId", &filter.account_id)? {
                query = query.filter(sales_order::Column::AccountId.eq(account_id));
            }
            if let Some(season_ids) = filter.season_ids {
                let mut parsed = Vec::with_capacity(season_ids.len());
                for id in &season_ids {
                    parsed.push(parse_uuid(id)?);
                }
                query = query.filter(sales_order::Column::SeasonId.is_in(parsed));
            }
            if let Some(stage) = filter.stage {
                query = query.filter(sales_order::Column::Stage.eq(sales_order::Stage::from(stage)));
            }
        }
        let records = query
            .order_by_desc(sales_order::Column::UpdatedAt)
            .order_by_asc(sales_order::Column::Id)
            .limit(requested as u64)
            .offset(skip)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(records.into_iter().map(OrderNode::from).collect())
    }

    async fn order(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<OrderNode>> {
        let db = database(ctx)?;
        let order_id = parse_uuid(&id)?;
        let record = sales_order::Entity::find_by_id(order_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(record.map(OrderNode::from))
    }

    #[graphql(name = "commission")]
    async fn commission(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "orderId")] order_id: ID,
    ) -> async_graphql::Result<Option<CommissionNode>> {
        let db = database(ctx)?;
        let order_id = parse_uuid(&order_id)?;
        let Some(record) = commission::Entity::find()
            .filter(commission::Column::OrderId.eq(order_id))
            .one(db.as_ref())
            .await
            .map_err(db_error)?
        else {
            return Ok(None);
        };
        let rows = load_payment_rows(db.as_ref(), record.id)
            .await
            .map_err(db_error)?;
        Ok(Some(commission_node(record, rows)))
    }

    #[graphql(name = "orderStages")]
    async fn order_stages(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<StageNode>> {
        let db = database(ctx)?;
        let records = stage_meta::Entity::find()
            .order_by_asc(stage_meta::Column::SortOrder)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(records.into_iter().map(StageNode::from).collect())
    }

    #[graphql(name = "commissionSummary")]
    async fn commission_summary(
        &self,
        ctx: &Context<'_>,
        filter: Option<SummaryFilterInput>,
    ) -> async_graphql::Result<CommissionSummaryNode> {
        let db = database(ctx)?;
        let filter = build_report_filter(filter)?;
        let span = info_span!(
            "sales.commissionSummary",
            has_brand = filter.brand_id.is_some(),
            has_seasons = filter.season_ids.is_some()
        );
        let _guard = span.enter();
        let orders = sales_order::Entity::find()
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        let commissions = commission::Entity::find()
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        let brands = brand::Entity::find()
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        let excluded = load_excluded_stages(db.as_ref()).await.map_err(db_error)?;
        let summary = summarize(&orders, &commissions, &brands, &excluded, &filter);
        Ok(CommissionSummaryNode::from(summary))
    }

    #[graphql(name = "paymentReport")]
    async fn payment_report(
        &self,
        ctx: &Context<'_>,
        filter: Option<SummaryFilterInput>,
    ) -> async_graphql::Result<Vec<PaymentGroupNode>> {
        let db = database(ctx)?;
        let filter = build_report_filter(filter)?;
        let span = info_span!(
            "sales.paymentReport",
            has_brand = filter.brand_id.is_some(),
            has_seasons = filter.season_ids.is_some()
        );
        let _guard = span.enter();
        let orders = sales_order::Entity::find()
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        let commissions = commission::Entity::find()
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        let payments = payment::Entity::find()
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        let excluded = load_excluded_stages(db.as_ref()).await.map_err(db_error)?;
        let groups = payment_report(&orders, &commissions, &payments, &excluded, &filter);
        Ok(groups.into_iter().map(PaymentGroupNode::from).collect())
    }

    async fn todos(
        &self,
        ctx: &Context<'_>,
        filter: Option<TodoFilter>,
        first: Option<i32>,
        offset: Option<i32>,
    ) -> async_graphql::Result<Vec<TodoNode>> {
        let db = database(ctx)?;
        let limit = first.unwrap_or(50).clamp(1, MAX_PAGE) as u64;
        let skip = offset.unwrap_or(0).max(0) as u64;
        let mut query = todo::Entity::find();
        if let Some(filter) = filter {
            if let Some(account_id) = parse_optional_id("accountId", &filter.account_id)? {
                query = query.filter(todo::Column::AccountId.eq(account_id));
            }
            if let Some(status) = filter.status {
                query = query.filter(todo::Column::Status.eq(todo::Status::from(status)));
            }
        }
        let records = query
            .order_by_asc(todo::Column::DueOn)
            .order_by_asc(todo::Column::CreatedAt)
            .limit(limit)
            .offset(skip)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(records.into_iter().map(TodoNode::from).collect())
    }
}

#[Object]
impl SalesMutation {
    #[graphql(name = "createBrand")]
    async fn create_brand(
        &self,
        ctx: &Context<'_>,
        input: NewBrandInput,
    ) -> async_graphql::Result<BrandNode> {
        let db = database(ctx)?;
        let name = validate_name("name", &input.name)?;
        let rate = validate_rate_bps(input.commission_bps.unwrap_or(0)).map_err(commission_error)?;
        let now: DateTimeWithTimeZone = Utc::now().into();
        let brand_id = Uuid::new_v4();
        let active = brand::ActiveModel {
            id: Set(brand_id),
            name: Set(name),
            commission_bps: Set(rate),
            website: Set(input.website.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        brand::Entity::insert(active)
            .exec_without_returning(db.as_ref())
            .await
            .map_err(db_error)?;
        let record = brand::Entity::find_by_id(brand_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("INTERNAL", "Failed to load inserted brand"))?;
        Ok(BrandNode::from(record))
    }

    /// Changing the default rate recomputes every commission of this brand's
    /// orders that carries no order-level override, in the same transaction.
    #[graphql(name = "updateBrand")]
    async fn update_brand(
        &self,
        ctx: &Context<'_>,
        input: UpdateBrandInput,
    ) -> async_graphql::Result<BrandNode> {
        let db = database(ctx)?;
        let brand_id = parse_uuid(&input.id)?;
        let new_rate = match input.commission_bps {
            Some(rate) => Some(validate_rate_bps(rate).map_err(commission_error)?),
            None => None,
        };

        let txn = db.begin().await.map_err(db_error)?;
        let existing = brand::Entity::find_by_id(brand_id)
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("NOT_FOUND", "Brand not found"))?;
        let rate_changed = new_rate.map(|r| r != existing.commission_bps).unwrap_or(false);
        let mut active: brand::ActiveModel = existing.into();
        if let Some(name) = &input.name {
            active.name = Set(validate_name("name", name)?);
        }
        if input.website.is_some() {
            active.website = Set(input.website.clone());
        }
        if let Some(rate) = new_rate {
            active.commission_bps = Set(rate);
        }
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&txn).await.map_err(db_error)?;

        if rate_changed {
            rederive_brand_commissions(&txn, brand_id, updated.commission_bps).await?;
        }
        txn.commit().await.map_err(db_error)?;
        Ok(BrandNode::from(updated))
    }

    #[graphql(name = "createAccount")]
    async fn create_account(
        &self,
        ctx: &Context<'_>,
        input: NewAccountInput,
    ) -> async_graphql::Result<AccountNode> {
        let db = database(ctx)?;
        let name = validate_name("name", &input.name)?;
        let now: DateTimeWithTimeZone = Utc::now().into();
        let account_id = Uuid::new_v4();
        let active = account::ActiveModel {
            id: Set(account_id),
            name: Set(name),
            city: Set(input.city.clone()),
            region: Set(input.region.clone()),
            notes_md: Set(input.notes_md.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        account::Entity::insert(active)
            .exec_without_returning(db.as_ref())
            .await
            .map_err(db_error)?;
        let record = account::Entity::find_by_id(account_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("INTERNAL", "Failed to load inserted account"))?;
        Ok(AccountNode::from(record))
    }

    #[graphql(name = "updateAccount")]
    async fn update_account(
        &self,
        ctx: &Context<'_>,
        input: UpdateAccountInput,
    ) -> async_graphql::Result<AccountNode> {
        let db = database(ctx)?;
        let account_id = parse_uuid(&input.id)?;
        let existing = account::Entity::find_by_id(account_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("NOT_FOUND", "Account not found"))?;
        let mut active: account::ActiveModel = existing.into();
        if let Some(name) = &input.name {
            active.name = Set(validate_name("name", name)?);
        }
        if input.city.is_some() {
            active.city = Set(input.city.clone());
        }
        if input.region.is_some() {
            active.region = Set(input.region.clone());
        }
        if input.notes_md.is_some() {
            active.notes_md = Set(input.notes_md.clone());
        }
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db.as_ref()).await.map_err(db_error)?;
        Ok(AccountNode::from(updated))
    }

    #[graphql(name = "createSeason")]
    async fn create_season(
        &self,
        ctx: &Context<'_>,
        input: NewSeasonInput,
    ) -> async_graphql::Result<SeasonNode> {
        let db = database(ctx)?;
        let name = validate_name("name", &input.name)?;
        if let (Some(starts), Some(ends)) = (input.starts_on, input.ends_on) {
            if ends < starts {
                return Err(validation_error("endsOn must not precede startsOn"));
            }
        }
        let now: DateTimeWithTimeZone = Utc::now().into();
        let season_id = Uuid::new_v4();
        let active = season::ActiveModel {
            id: Set(season_id),
            name: Set(name),
            starts_on: Set(input.starts_on),
            ends_on: Set(input.ends_on),
            created_at: Set(now),
            updated_at: Set(now),
        };
        season::Entity::insert(active)
            .exec_without_returning(db.as_ref())
            .await
            .map_err(db_error)?;
        let record = season::Entity::find_by_id(season_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("INTERNAL", "Failed to load inserted season"))?;
        Ok(SeasonNode::from(record))
    }

    #[graphql(name = "createOrder")]
    async fn create_order(
        &self,
        ctx: &Context<'_>,
        input: NewOrderInput,
    ) -> async_graphql::Result<OrderNode> {
        let db = database(ctx)?;
        let total = validate_total_cents(input.total_cents).map_err(commission_error)?;
        let override_bps = match input.commission_override_bps {
            Some(rate) => Some(validate_rate_bps(rate).map_err(commission_error)?),
            None => None,
        };
        let account_id = parse_uuid(&input.account_id)?;
        let brand_id = parse_uuid(&input.brand_id)?;
        let season_id = parse_optional_id("seasonId", &input.season_id)?;
        let stage = sales_order::Stage::from(input.stage.unwrap_or(OrderStage::Open));

        let txn = db.begin().await.map_err(db_error)?;
        account::Entity::find_by_id(account_id)
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("NOT_FOUND", "Account not found"))?;
        let brand_record = brand::Entity::find_by_id(brand_id)
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("NOT_FOUND", "Brand not found"))?;
        if let Some(season_id) = season_id {
            season::Entity::find_by_id(season_id)
                .one(&txn)
                .await
                .map_err(db_error)?
                .ok_or_else(|| error_with_code("NOT_FOUND", "Season not found"))?;
        }

        let now: DateTimeWithTimeZone = Utc::now().into();
        let order_id = Uuid::new_v4();
        let active = sales_order::ActiveModel {
            id: Set(order_id),
            account_id: Set(account_id),
            brand_id: Set(brand_id),
            season_id: Set(season_id),
            total_cents: Set(total),
            stage: Set(stage),
            commission_override_bps: Set(override_bps),
            ordered_on: Set(input.ordered_on),
            created_at: Set(now),
            updated_at: Set(now),
        };
        sales_order::Entity::insert(active)
            .exec_without_returning(&txn)
            .await
            .map_err(db_error)?;

        let excluded = load_excluded_stages(&txn).await.map_err(db_error)?;
        if !excluded.contains(stage.as_str()) {
            let rate = effective_rate_bps(override_bps, brand_record.commission_bps);
            insert_commission(&txn, order_id, commission_due_cents(total, rate), now).await?;
        }

        let record = sales_order::Entity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("INTERNAL", "Failed to load inserted order"))?;
        txn.commit().await.map_err(db_error)?;
        Ok(OrderNode::from(record))
    }

    /// Total and override edits re-derive due/remaining/status on the linked
    /// commission. The payment ledger and the paid aggregate stay untouched.
    #[graphql(name = "updateOrder")]
    async fn update_order(
        &self,
        ctx: &Context<'_>,
        input: UpdateOrderInput,
    ) -> async_graphql::Result<OrderNode> {
        let db = database(ctx)?;
        let order_id = parse_uuid(&input.id)?;
        let new_total = match input.total_cents {
            Some(total) => Some(validate_total_cents(total).map_err(commission_error)?),
            None => None,
        };
        let new_override = match &input.commission_override_bps {
            MaybeUndefined::Undefined => None,
            MaybeUndefined::Null => Some(None),
            MaybeUndefined::Value(rate) => {
                Some(Some(validate_rate_bps(*rate).map_err(commission_error)?))
            }
        };

        let txn = db.begin().await.map_err(db_error)?;
        let existing = sales_order::Entity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("NOT_FOUND", "Order not found"))?;
        let rate_inputs_changed = new_total.map(|t| t != existing.total_cents).unwrap_or(false)
            || new_override
                .map(|o| o != existing.commission_override_bps)
                .unwrap_or(false);
        let brand_id = existing.brand_id;
        let mut active: sales_order::ActiveModel = existing.into();
        if let Some(total) = new_total {
            active.total_cents = Set(total);
        }
        if let Some(override_bps) = new_override {
            active.commission_override_bps = Set(override_bps);
        }
        match &input.season_id {
            MaybeUndefined::Undefined => {}
            MaybeUndefined::Null => active.season_id = Set(None),
            MaybeUndefined::Value(id) => {
                let season_id = parse_uuid(id)?;
                season::Entity::find_by_id(season_id)
                    .one(&txn)
                    .await
                    .map_err(db_error)?
                    .ok_or_else(|| error_with_code("NOT_FOUND", "Season not found"))?;
                active.season_id = Set(Some(season_id));
            }
        }
        if input.ordered_on.is_some() {
            active.ordered_on = Set(input.ordered_on);
        }
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&txn).await.map_err(db_error)?;

        if rate_inputs_changed {
            if let Some(row) = commission::Entity::find()
                .filter(commission::Column::OrderId.eq(order_id))
                .one(&txn)
                .await
                .map_err(db_error)?
            {
                let brand_record = brand::Entity::find_by_id(brand_id)
                    .one(&txn)
                    .await
                    .map_err(db_error)?
                    .ok_or_else(|| error_with_code("NOT_FOUND", "Brand not found"))?;
                let rate = effective_rate_bps(
                    updated.commission_override_bps,
                    brand_record.commission_bps,
                );
                let due = commission_due_cents(updated.total_cents, rate);
                rederive_commission_due(&txn, row, due).await?;
            }
        }
        txn.commit().await.map_err(db_error)?;
        Ok(OrderNode::from(updated))
    }

    /// Moving into an excluded stage deletes the commission and its payments;
    /// moving into a commissionable stage creates the commission if missing.
    #[graphql(name = "moveOrderStage")]
    async fn move_order_stage(
        &self,
        ctx: &Context<'_>,
        id: ID,
        stage: OrderStage,
    ) -> async_graphql::Result<OrderNode> {
        let db = database(ctx)?;
        let order_id = parse_uuid(&id)?;
        let stage = sales_order::Stage::from(stage);

        let txn = db.begin().await.map_err(db_error)?;
        let existing = sales_order::Entity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("NOT_FOUND", "Order not found"))?;
        let now: DateTimeWithTimeZone = Utc::now().into();
        if existing.stage == stage {
            let mut active: sales_order::ActiveModel = existing.into();
            active.updated_at = Set(now);
            let updated = active.update(&txn).await.map_err(db_error)?;
            txn.commit().await.map_err(db_error)?;
            return Ok(OrderNode::from(updated));
        }

        let brand_id = existing.brand_id;
        let total = existing.total_cents;
        let override_bps = existing.commission_override_bps;
        let mut active: sales_order::ActiveModel = existing.into();
        active.stage = Set(stage);
        active.updated_at = Set(now);
        let updated = active.update(&txn).await.map_err(db_error)?;

        let excluded = load_excluded_stages(&txn).await.map_err(db_error)?;
        let row = commission::Entity::find()
            .filter(commission::Column::OrderId.eq(order_id))
            .one(&txn)
            .await
            .map_err(db_error)?;
        if excluded.contains(stage.as_str()) {
            if let Some(row) = row {
                delete_commission_row(&txn, &row).await.map_err(db_error)?;
            }
        } else if row.is_none() {
            let brand_record = brand::Entity::find_by_id(brand_id)
                .one(&txn)
                .await
                .map_err(db_error)?
                .ok_or_else(|| error_with_code("NOT_FOUND", "Brand not found"))?;
            let rate = effective_rate_bps(override_bps, brand_record.commission_bps);
            insert_commission(&txn, order_id, commission_due_cents(total, rate), now).await?;
        }
        txn.commit().await.map_err(db_error)?;
        Ok(OrderNode::from(updated))
    }

    /// The commission and its payments go first; nothing cascades from the
    /// order row itself.
    #[graphql(name = "deleteOrder")]
    async fn delete_order(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let db = database(ctx)?;
        let order_id = parse_uuid(&id)?;
        let txn = db.begin().await.map_err(db_error)?;
        let Some(existing) = sales_order::Entity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(db_error)?
        else {
            return Ok(false);
        };
        if let Some(row) = commission::Entity::find()
            .filter(commission::Column::OrderId.eq(order_id))
            .one(&txn)
            .await
            .map_err(db_error)?
        {
            delete_commission_row(&txn, &row).await.map_err(db_error)?;
        }
        sales_order::Entity::delete_by_id(existing.id)
            .exec(&txn)
            .await
            .map_err(db_error)?;
        txn.commit().await.map_err(db_error)?;
        Ok(true)
    }

    #[graphql(name = "addPayment")]
    async fn add_payment(
        &self,
        ctx: &Context<'_>,
        input: NewPaymentInput,
    ) -> async_graphql::Result<CommissionNode> {
        let db = database(ctx)?;
        let order_id = parse_uuid(&input.order_id)?;
        let amount = validate_payment_cents(input.amount_cents).map_err(commission_error)?;

        let txn = db.begin().await.map_err(db_error)?;
        let row = commission::Entity::find()
            .filter(commission::Column::OrderId.eq(order_id))
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("NOT_FOUND", "No commission for order"))?;
        let existing_rows = load_payment_rows(&txn, row.id).await.map_err(db_error)?;
        verify_structured_rows(&row, &existing_rows)?;

        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut next_position = existing_rows.len() as i32;
        // first structured payment on a legacy row: persist the scalar as a
        // real entry so the re-sum keeps it
        if existing_rows.is_empty() && row.amount_paid_cents > 0 {
            let legacy = payment::ActiveModel {
                id: Set(Uuid::new_v4()),
                commission_id: Set(row.id),
                amount_cents: Set(row.amount_paid_cents),
                paid_on: Set(row.paid_on),
                position: Set(0),
                created_at: Set(now),
            };
            payment::Entity::insert(legacy)
                .exec_without_returning(&txn)
                .await
                .map_err(db_error)?;
            next_position = 1;
        }
        let active = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            commission_id: Set(row.id),
            amount_cents: Set(amount),
            paid_on: Set(input.paid_on),
            position: Set(next_position),
            created_at: Set(now),
        };
        payment::Entity::insert(active)
            .exec_without_returning(&txn)
            .await
            .map_err(db_error)?;

        let (updated, rows) = resum_commission(&txn, row).await?;
        txn.commit().await.map_err(db_error)?;
        Ok(commission_node(updated, rows))
    }

    #[graphql(name = "updatePayment")]
    async fn update_payment(
        &self,
        ctx: &Context<'_>,
        input: UpdatePaymentInput,
    ) -> async_graphql::Result<CommissionNode> {
        let db = database(ctx)?;
        let payment_id = parse_uuid(&input.id)?;
        let new_amount = match input.amount_cents {
            Some(amount) => Some(validate_payment_cents(amount).map_err(commission_error)?),
            None => None,
        };

        let txn = db.begin().await.map_err(db_error)?;
        let existing = payment::Entity::find_by_id(payment_id)
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("NOT_FOUND", "Payment not found"))?;
        let row = commission::Entity::find_by_id(existing.commission_id)
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("INTERNAL", "Payment without commission"))?;
        let current_rows = load_payment_rows(&txn, row.id).await.map_err(db_error)?;
        verify_structured_rows(&row, &current_rows)?;

        let mut active: payment::ActiveModel = existing.into();
        if let Some(amount) = new_amount {
            active.amount_cents = Set(amount);
        }
        match input.paid_on {
            MaybeUndefined::Undefined => {}
            MaybeUndefined::Null => active.paid_on = Set(None),
            MaybeUndefined::Value(date) => active.paid_on = Set(Some(date)),
        }
        active.update(&txn).await.map_err(db_error)?;

        let (updated, rows) = resum_commission(&txn, row).await?;
        txn.commit().await.map_err(db_error)?;
        Ok(commission_node(updated, rows))
    }

    #[graphql(name = "removePayment")]
    async fn remove_payment(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<CommissionNode> {
        let db = database(ctx)?;
        let payment_id = parse_uuid(&id)?;
        let txn = db.begin().await.map_err(db_error)?;
        let existing = payment::Entity::find_by_id(payment_id)
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("NOT_FOUND", "Payment not found"))?;
        let row = commission::Entity::find_by_id(existing.commission_id)
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("INTERNAL", "Payment without commission"))?;
        let current_rows = load_payment_rows(&txn, row.id).await.map_err(db_error)?;
        verify_structured_rows(&row, &current_rows)?;

        payment::Entity::delete_by_id(existing.id)
            .exec(&txn)
            .await
            .map_err(db_error)?;

        let (updated, rows) = resum_commission(&txn, row).await?;
        txn.commit().await.map_err(db_error)?;
        Ok(commission_node(updated, rows))
    }

    #[graphql(name = "createTodo")]
    async fn create_todo(
        &self,
        ctx: &Context<'_>,
        input: NewTodoInput,
    ) -> async_graphql::Result<TodoNode> {
        let db = database(ctx)?;
        let title = validate_name("title", &input.title)?;
        let account_id = parse_optional_id("accountId", &input.account_id)?;
        if let Some(account_id) = account_id {
            account::Entity::find_by_id(account_id)
                .one(db.as_ref())
                .await
                .map_err(db_error)?
                .ok_or_else(|| error_with_code("NOT_FOUND", "Account not found"))?;
        }
        let now: DateTimeWithTimeZone = Utc::now().into();
        let todo_id = Uuid::new_v4();
        let active = todo::ActiveModel {
            id: Set(todo_id),
            title: Set(title),
            notes_md: Set(input.notes_md.clone()),
            status: Set(todo::Status::Open),
            due_on: Set(input.due_on),
            assignee: Set(input.assignee.clone()),
            account_id: Set(account_id),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        todo::Entity::insert(active)
            .exec_without_returning(db.as_ref())
            .await
            .map_err(db_error)?;
        let record = todo::Entity::find_by_id(todo_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("INTERNAL", "Failed to load inserted todo"))?;
        Ok(TodoNode::from(record))
    }

    #[graphql(name = "completeTodo")]
    async fn complete_todo(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<TodoNode> {
        let db = database(ctx)?;
        let todo_id = parse_uuid(&id)?;
        let existing = todo::Entity::find_by_id(todo_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
            .ok_or_else(|| error_with_code("NOT_FOUND", "Todo not found"))?;
        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut active: todo::ActiveModel = existing.into();
        active.status = Set(todo::Status::Done);
        active.completed_at = Set(Some(now));
        active.updated_at = Set(now);
        let updated = active.update(db.as_ref()).await.map_err(db_error)?;
        Ok(TodoNode::from(updated))
    }

    #[graphql(name = "deleteTodo")]
    async fn delete_todo(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let db = database(ctx)?;
        let todo_id = parse_uuid(&id)?;
        let result = todo::Entity::delete_by_id(todo_id)
            .exec(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected > 0)
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum OrderStage {
    #[graphql(name = "OPEN")]
    Open,
    #[graphql(name = "WON")]
    Won,
    #[graphql(name = "LOST")]
    Lost,
    #[graphql(name = "VOID")]
    Void,
}

impl From<OrderStage> for sales_order::Stage {
    fn from(value: OrderStage) -> Self {
        match value {
            OrderStage::Open => sales_order::Stage::Open,
            OrderStage::Won => sales_order::Stage::Won,
            OrderStage::Lost => sales_order::Stage::Lost,
            OrderStage::Void => sales_order::Stage::Void,
        }
    }
}

impl From<sales_order::Stage> for OrderStage {
    fn from(value: sales_order::Stage) -> Self {
        match value {
            sales_order::Stage::Open => OrderStage::Open,
            sales_order::Stage::Won => OrderStage::Won,
            sales_order::Stage::Lost => OrderStage::Lost,
            sales_order::Stage::Void => OrderStage::Void,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum PayStatus {
    #[graphql(name = "UNPAID")]
    Unpaid,
    #[graphql(name = "PARTIAL")]
    Partial,
    #[graphql(name = "PAID")]
    Paid,
}

impl From<commission::PayStatus> for PayStatus {
    fn from(value: commission::PayStatus) -> Self {
        match value {
            commission::PayStatus::Unpaid => PayStatus::Unpaid,
            commission::PayStatus::Partial => PayStatus::Partial,
            commission::PayStatus::Paid => PayStatus::Paid,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum TodoStatus {
    #[graphql(name = "OPEN")]
    Open,
    #[graphql(name = "DONE")]
    Done,
}

impl From<TodoStatus> for todo::Status {
    fn from(value: TodoStatus) -> Self {
        match value {
            TodoStatus::Open => todo::Status::Open,
            TodoStatus::Done => todo::Status::Done,
        }
    }
}

impl From<todo::Status> for TodoStatus {
    fn from(value: todo::Status) -> Self {
        match value {
            todo::Status::Open => TodoStatus::Open,
            todo::Status::Done => TodoStatus::Done,
        }
    }
}

#[derive(InputObject, Default, Clone)]
pub struct OrderFilter {
    #[graphql(name = "brandId")]
    pub brand_id: Option<ID>,
    #[graphql(name = "accountId")]
    pub account_id: Option<ID>,
    #[graphql(name = "seasonIds")]
    pub season_ids: Option<Vec<ID>>,
    pub stage: Option<OrderStage>,
}

#[derive(InputObject, Default, Clone)]
pub struct SummaryFilterInput {
    #[graphql(name = "brandId")]
    pub brand_id: Option<ID>,
    #[graphql(name = "seasonIds")]
    pub season_ids: Option<Vec<ID>>,
}

#[derive(InputObject, Default, Clone)]
pub struct TodoFilter {
    #[graphql(name = "accountId")]
    pub account_id: Option<ID>,
    pub status: Option<TodoStatus>,
}

#[derive(InputObject, Clone)]
pub struct NewBrandInput {
    pub name: String,
    #[graphql(name = "commissionBps")]
    pub commission_bps: Option<i32>,
    pub website: Option<String>,
}

#[derive(InputObject, Clone)]
pub struct UpdateBrandInput {
    pub id: ID,
    pub name: Option<String>,
    #[graphql(name = "commissionBps")]
    pub commission_bps: Option<i32>,
    pub website: Option<String>,
}

#[derive(InputObject, Clone)]
pub struct NewAccountInput {
    pub name: String,
    pub city: Option<String>,
    pub region: Option<String>,
    #[graphql(name = "notesMd")]
    pub notes_md: Option<String>,
}

#[derive(InputObject, Clone)]
pub struct UpdateAccountInput {
    pub id: ID,
    pub name: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    #[graphql(name = "notesMd")]
    pub notes_md: Option<String>,
}

#[derive(InputObject, Clone)]
pub struct NewSeasonInput {
    pub name: String,
    #[graphql(name = "startsOn")]
    pub starts_on: Option<NaiveDate>,
    #[graphql(name = "endsOn")]
    pub ends_on: Option<NaiveDate>,
}

#[derive(InputObject, Clone)]
pub struct NewOrderInput {
    #[graphql(name = "accountId")]
    pub account_id: ID,
    #[graphql(name = "brandId")]
    pub brand_id: ID,
    #[graphql(name = "seasonId")]
    pub season_id: Option<ID>,
    #[graphql(name = "totalCents")]
    pub total_cents: i64,
    pub stage: Option<OrderStage>,
    #[graphql(name = "commissionOverrideBps")]
    pub commission_override_bps: Option<i32>,
    #[graphql(name = "orderedOn")]
    pub ordered_on: Option<NaiveDate>,
}

#[derive(InputObject, Clone)]
pub struct UpdateOrderInput {
    pub id: ID,
    #[graphql(name = "totalCents")]
    pub total_cents: Option<i64>,
    #[graphql(name = "commissionOverrideBps")]
    pub commission_override_bps: MaybeUndefined<i32>,
    #[graphql(name = "seasonId")]
    pub season_id: MaybeUndefined<ID>,
    #[graphql(name = "orderedOn")]
    pub ordered_on: Option<NaiveDate>,
}

#[derive(InputObject, Clone)]
pub struct NewPaymentInput {
    #[graphql(name = "orderId")]
    pub order_id: ID,
    #[graphql(name = "amountCents")]
    pub amount_cents: i64,
    #[graphql(name = "paidOn")]
    pub paid_on: Option<NaiveDate>,
}

#[derive(InputObject, Clone)]
pub struct UpdatePaymentInput {
    pub id: ID,
    #[graphql(name = "amountCents")]
    pub amount_cents: Option<i64>,
    #[graphql(name = "paidOn")]
    pub paid_on: MaybeUndefined<NaiveDate>,
}

#[derive(InputObject, Clone)]
pub struct NewTodoInput {
    pub title: String,
    #[graphql(name = "notesMd")]
    pub notes_md: Option<String>,
    #[graphql(name = "dueOn")]
    pub due_on: Option<NaiveDate>,
    pub assignee: Option<String>,
    #[graphql(name = "accountId")]
    pub account_id: Option<ID>,
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Brand")]
pub struct BrandNode {
    pub id: ID,
    pub name: String,
    #[graphql(name = "commissionBps")]
    pub commission_bps: i32,
    pub website: Option<String>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[graphql(name = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<brand::Model> for BrandNode {
    fn from(model: brand::Model) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            name: model.name,
            commission_bps: model.commission_bps,
            website: model.website,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Account")]
pub struct AccountNode {
    pub id: ID,
    pub name: String,
    pub city: Option<String>,
    pub region: Option<String>,
    #[graphql(name = "notesMd")]
    pub notes_md: Option<String>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[graphql(name = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<account::Model> for AccountNode {
    fn from(model: account::Model) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            name: model.name,
            city: model.city,
            region: model.region,
            notes_md: model.notes_md,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Season")]
pub struct SeasonNode {
    pub id: ID,
    pub name: String,
    #[graphql(name = "startsOn")]
    pub starts_on: Option<NaiveDate>,
    #[graphql(name = "endsOn")]
    pub ends_on: Option<NaiveDate>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[graphql(name = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<season::Model> for SeasonNode {
    fn from(model: season::Model) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            name: model.name,
            starts_on: model.starts_on,
            ends_on: model.ends_on,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Order")]
pub struct OrderNode {
    pub id: ID,
    #[graphql(name = "accountId")]
    pub account_id: ID,
    #[graphql(name = "brandId")]
    pub brand_id: ID,
    #[graphql(name = "seasonId")]
    pub season_id: Option<ID>,
    #[graphql(name = "totalCents")]
    pub total_cents: i64,
    pub stage: OrderStage,
    #[graphql(name = "commissionOverrideBps")]
    pub commission_override_bps: Option<i32>,
    #[graphql(name = "orderedOn")]
    pub ordered_on: Option<NaiveDate>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[graphql(name = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<sales_order::Model> for OrderNode {
    fn from(model: sales_order::Model) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            account_id: ID::from(model.account_id.to_string()),
            brand_id: ID::from(model.brand_id.to_string()),
            season_id: model.season_id.map(|id| ID::from(id.to_string())),
            total_cents: model.total_cents,
            stage: OrderStage::from(model.stage),
            commission_override_bps: model.commission_override_bps,
            ordered_on: model.ordered_on,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Payment")]
pub struct PaymentNode {
    pub id: ID,
    #[graphql(name = "amountCents")]
    pub amount_cents: i64,
    #[graphql(name = "paidOn")]
    pub paid_on: Option<NaiveDate>,
    pub position: i32,
}

impl From<payment::Model> for PaymentNode {
    fn from(model: payment::Model) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            amount_cents: model.amount_cents,
            paid_on: model.paid_on,
            position: model.position,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Commission")]
pub struct CommissionNode {
    pub id: ID,
    #[graphql(name = "orderId")]
    pub order_id: ID,
    #[graphql(name = "commissionDueCents")]
    pub commission_due_cents: i64,
    #[graphql(name = "amountPaidCents")]
    pub amount_paid_cents: i64,
    #[graphql(name = "amountRemainingCents")]
    pub amount_remaining_cents: i64,
    #[graphql(name = "payStatus")]
    pub pay_status: PayStatus,
    #[graphql(name = "paidOn")]
    pub paid_on: Option<NaiveDate>,
    pub payments: Vec<PaymentNode>,
}

fn commission_node(model: commission::Model, rows: Vec<payment::Model>) -> CommissionNode {
    CommissionNode {
        id: ID::from(model.id.to_string()),
        order_id: ID::from(model.order_id.to_string()),
        commission_due_cents: model.commission_due_cents,
        amount_paid_cents: model.amount_paid_cents,
        amount_remaining_cents: model.amount_remaining_cents,
        pay_status: PayStatus::from(model.pay_status),
        paid_on: model.paid_on,
        payments: rows.into_iter().map(PaymentNode::from).collect(),
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "OrderStageMeta")]
pub struct StageNode {
    pub key: String,
    #[graphql(name = "displayName")]
    pub display_name: String,
    #[graphql(name = "sortOrder")]
    pub sort_order: i32,
    #[graphql(name = "isExcluded")]
    pub is_excluded: bool,
}

impl From<stage_meta::Model> for StageNode {
    fn from(model: stage_meta::Model) -> Self {
        Self {
            key: model.key,
            display_name: model.display_name,
            sort_order: model.sort_order as i32,
            is_excluded: model.is_excluded,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Todo")]
pub struct TodoNode {
    pub id: ID,
    pub title: String,
    #[graphql(name = "notesMd")]
    pub notes_md: Option<String>,
    pub status: TodoStatus,
    #[graphql(name = "dueOn")]
    pub due_on: Option<NaiveDate>,
    pub assignee: Option<String>,
    #[graphql(name = "accountId")]
    pub account_id: Option<ID>,
    #[graphql(name = "completedAt")]
    pub completed_at: Option<DateTime<Utc>>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[graphql(name = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<todo::Model> for TodoNode {
    fn from(model: todo::Model) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            title: model.title,
            notes_md: model.notes_md,
            status: TodoStatus::from(model.status),
            due_on: model.due_on,
            assignee: model.assignee,
            account_id: model.account_id.map(|id| ID::from(id.to_string())),
            completed_at: model.completed_at.map(Into::into),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "CommissionSummary")]
pub struct CommissionSummaryNode {
    #[graphql(name = "totalSalesCents")]
    pub total_sales_cents: i64,
    #[graphql(name = "commissionEarnedCents")]
    pub commission_earned_cents: i64,
    #[graphql(name = "commissionPaidCents")]
    pub commission_paid_cents: i64,
    #[graphql(name = "commissionOutstandingCents")]
    pub commission_outstanding_cents: i64,
}

impl From<crate::report::Summary> for CommissionSummaryNode {
    fn from(summary: crate::report::Summary) -> Self {
        Self {
            total_sales_cents: summary.total_sales_cents,
            commission_earned_cents: summary.commission_earned_cents,
            commission_paid_cents: summary.commission_paid_cents,
            commission_outstanding_cents: summary.commission_outstanding_cents,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "PaymentGroup")]
pub struct PaymentGroupNode {
    #[graphql(name = "paidOn")]
    pub paid_on: Option<NaiveDate>,
    #[graphql(name = "subtotalCents")]
    pub subtotal_cents: i64,
    #[graphql(name = "entryCount")]
    pub entry_count: i32,
}

impl From<crate::report::PaymentGroup> for PaymentGroupNode {
    fn from(group: crate::report::PaymentGroup) -> Self {
        Self {
            paid_on: group.paid_on,
            subtotal_cents: group.subtotal_cents,
            entry_count: group.entry_count,
        }
    }
}

async fn load_payment_rows<C: ConnectionTrait>(
    conn: &C,
    commission_id: Uuid,
) -> Result<Vec<payment::Model>, DbErr> {
    payment::Entity::find()
        .filter(payment::Column::CommissionId.eq(commission_id))
        .order_by_asc(payment::Column::Position)
        .all(conn)
        .await
}

pub async fn load_excluded_stages<C: ConnectionTrait>(conn: &C) -> Result<HashSet<String>, DbErr> {
    let rows = stage_meta::Entity::find()
        .filter(stage_meta::Column::IsExcluded.eq(true))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|row| row.key).collect())
}

async fn insert_commission(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    due_cents: i64,
    now: DateTimeWithTimeZone,
) -> async_graphql::Result<()> {
    let active = commission::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        commission_due_cents: Set(due_cents),
        amount_paid_cents: Set(0),
        amount_remaining_cents: Set(due_cents),
        pay_status: Set(classify(0, due_cents)),
        paid_on: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    commission::Entity::insert(active)
        .exec_without_returning(txn)
        .await
        .map_err(db_error)?;
    Ok(())
}

async fn delete_commission_row(
    txn: &DatabaseTransaction,
    row: &commission::Model,
) -> Result<(), DbErr> {
    payment::Entity::delete_many()
        .filter(payment::Column::CommissionId.eq(row.id))
        .exec(txn)
        .await?;
    commission::Entity::delete_by_id(row.id).exec(txn).await?;
    Ok(())
}

/// New due amount, paid aggregate untouched.
async fn rederive_commission_due(
    txn: &DatabaseTransaction,
    row: commission::Model,
    due_cents: i64,
) -> async_graphql::Result<()> {
    let paid = row.amount_paid_cents;
    let mut active: commission::ActiveModel = row.into();
    active.commission_due_cents = Set(due_cents);
    active.amount_remaining_cents = Set((due_cents - paid).max(0));
    active.pay_status = Set(classify(paid, due_cents));
    active.updated_at = Set(Utc::now().into());
    active.update(txn).await.map_err(db_error)?;
    Ok(())
}

async fn rederive_brand_commissions(
    txn: &DatabaseTransaction,
    brand_id: Uuid,
    rate_bps: i32,
) -> async_graphql::Result<()> {
    let orders = sales_order::Entity::find()
        .filter(sales_order::Column::BrandId.eq(brand_id))
        .filter(sales_order::Column::CommissionOverrideBps.is_null())
        .all(txn)
        .await
        .map_err(db_error)?;
    if orders.is_empty() {
        return Ok(());
    }
    let totals: HashMap<Uuid, i64> = orders.iter().map(|o| (o.id, o.total_cents)).collect();
    let rows = commission::Entity::find()
        .filter(commission::Column::OrderId.is_in(totals.keys().copied().collect::<Vec<_>>()))
        .all(txn)
        .await
        .map_err(db_error)?;
    for row in rows {
        let Some(total) = totals.get(&row.order_id).copied() else {
            continue;
        };
        rederive_commission_due(txn, row, commission_due_cents(total, rate_bps)).await?;
    }
    Ok(())
}

/// Full re-sum of the structured ledger after a payment mutation. Returns the
/// updated commission row and its payment rows in position order.
async fn resum_commission(
    txn: &DatabaseTransaction,
    row: commission::Model,
) -> async_graphql::Result<(commission::Model, Vec<payment::Model>)> {
    let mut rows = load_payment_rows(txn, row.id).await.map_err(db_error)?;
    // keep positions dense after a remove so the next append cannot collide
    for (idx, payment_row) in rows.iter_mut().enumerate() {
        let position = idx as i32;
        if payment_row.position != position {
            let mut active: payment::ActiveModel = payment_row.clone().into();
            active.position = Set(position);
            *payment_row = active.update(txn).await.map_err(db_error)?;
        }
    }
    let entries: Vec<LedgerEntry> = rows
        .iter()
        .map(|p| LedgerEntry {
            amount_cents: p.amount_cents,
            paid_on: p.paid_on,
        })
        .collect();
    let state = recompute(row.commission_due_cents, &Ledger::Structured(entries));
    let mut active: commission::ActiveModel = row.into();
    active.amount_paid_cents = Set(state.amount_paid_cents);
    active.amount_remaining_cents = Set(state.amount_remaining_cents);
    active.pay_status = Set(state.pay_status);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(txn).await.map_err(db_error)?;
    Ok((updated, rows))
}

/// Guard for the ledger-sum invariant before mutating a structured ledger.
/// A mismatch means some writer bypassed the recompute path.
fn verify_structured_rows(
    row: &commission::Model,
    rows: &[payment::Model],
) -> async_graphql::Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let summed: i64 = rows.iter().map(|p| p.amount_cents).sum();
    if summed != row.amount_paid_cents {
        return Err(commission_error(CommissionError::LedgerMismatch {
            stored: row.amount_paid_cents,
            summed,
        }));
    }
    Ok(())
}

fn build_report_filter(input: Option<SummaryFilterInput>) -> async_graphql::Result<ReportFilter> {
    let Some(input) = input else {
        return Ok(ReportFilter::default());
    };
    let brand_id = parse_optional_id("brandId", &input.brand_id)?;
    let season_ids = match input.season_ids {
        Some(ids) => {
            let mut parsed = HashSet::with_capacity(ids.len());
            for id in &ids {
                parsed.insert(parse_uuid(id)?);
            }
            Some(parsed)
        }
        None => None,
    };
    Ok(ReportFilter {
        brand_id,
        season_ids,
    })
}

fn parse_optional_id(field: &str, value: &Option<ID>) -> async_graphql::Result<Option<Uuid>> {
    match value {
        Some(id) => Uuid::parse_str(id.as_str())
            .map(Some)
            .map_err(|_| validation_error(format!("{} is not a valid UUID", field))),
        None => Ok(None),
    }
}

fn sanitize_optional_filter(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn validate_name(field: &str, value: &str) -> async_graphql::Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(validation_error(format!("{} must not be empty", field)));
    }
    if trimmed.len() > 256 {
        return Err(validation_error(format!(
            "{} must be at most 256 characters",
            field
        )));
    }
    Ok(trimmed.to_string())
}

fn database(ctx: &Context<'_>) -> async_graphql::Result<Arc<DatabaseConnection>> {
    ctx.data::<Arc<DatabaseConnection>>()
        .cloned()
        .map_err(|_| error_with_code("INTERNAL", "Missing database connection"))
}

fn parse_uuid(id: &ID) -> async_graphql::Result<Uuid> {
    Uuid::parse_str(id.as_str()).map_err(|_| error_with_code("BAD_REQUEST", "Invalid ID"))
}

fn db_error(err: DbErr) -> Error {
    error_with_code("INTERNAL", format!("Database error: {}", err))
}

fn commission_error(err: CommissionError) -> Error {
    match err {
        CommissionError::LedgerMismatch { .. } => error_with_code("INTERNAL", err.to_string()),
        _ => validation_error(err.to_string()),
    }
}

fn error_with_code(code: &'static str, message: impl Into<String>) -> Error {
    Error::new(message).extend_with(|_, e| e.set("code", code))
}

fn validation_error(message: impl Into<String>) -> Error {
    error_with_code("VALIDATION", message)
}

const STAGE_META_DEFAULTS: &[(&str, &str, i16, bool)] = &[
    ("OPEN", "Open", 0, false),
    ("WON", "Won", 1, false),
    ("LOST", "Lost", 2, true),
    ("VOID", "Void", 3, true),
];

pub async fn ensure_stage_meta_defaults(db: &DatabaseConnection) -> Result<(), DbErr> {
    let rows: Vec<stage_meta::ActiveModel> = STAGE_META_DEFAULTS
        .iter()
        .map(|(key, display, order, excluded)| stage_meta::ActiveModel {
            key: Set((*key).to_string()),
            display_name: Set((*display).to_string()),
            sort_order: Set(*order),
            is_excluded: Set(*excluded),
        })
        .collect();
    // all-conflict inserts surface as RecordNotInserted; the defaults being
    // present already is the success case
    match stage_meta::Entity::insert_many(rows)
        .on_conflict(
            OnConflict::column(stage_meta::Column::Key)
                .do_nothing()
                .to_owned(),
        )
        .exec(db)
        .await
    {
        Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
        Err(err) => Err(err),
    }
}

#[derive(Debug, Clone)]
pub struct SeededRecords {
    pub brands: Vec<brand::Model>,
    pub accounts: Vec<account::Model>,
    pub seasons: Vec<season::Model>,
    pub orders: Vec<sales_order::Model>,
}

impl SeededRecords {
    pub fn brand_named(&self, name: &str) -> Option<&brand::Model> {
        self.brands.iter().find(|b| b.name == name)
    }

    pub fn account_named(&self, name: &str) -> Option<&account::Model> {
        self.accounts.iter().find(|a| a.name == name)
    }

    pub fn season_named(&self, name: &str) -> Option<&season::Model> {
        self.seasons.iter().find(|s| s.name == name)
    }

    pub fn order_for(&self, account: &str, brand: &str) -> Option<&sales_order::Model> {
        let account_id = self.account_named(account)?.id;
        let brand_id = self.brand_named(brand)?.id;
        self.orders
            .iter()
            .find(|o| o.account_id == account_id && o.brand_id == brand_id)
    }
}

pub async fn seed_demo(db: &DatabaseConnection) -> Result<SeededRecords, DbErr> {
    ensure_stage_meta_defaults(db).await?;
    let seeded_at: DateTimeWithTimeZone = Utc::now().into();

    let northwind = seed_brand(db, "Northwind Apparel", 500, seeded_at).await?;
    let cascade = seed_brand(db, "Cascade Footwear", 750, seeded_at).await?;
    let harbor = seed_brand(db, "Harbor Goods", 0, seeded_at).await?;

    let summit = seed_account(db, "Summit Outfitters", Some("Bozeman"), seeded_at).await?;
    let lakeside = seed_account(db, "Lakeside Mercantile", Some("Duluth"), seeded_at).await?;
    let pinetree = seed_account(db, "Pine & Twine", None, seeded_at).await?;

    let spring = seed_season(db, "Spring 2025", (2025, 1, 1), (2025, 6, 30), seeded_at).await?;
    let fall = seed_season(db, "Fall 2025", (2025, 7, 1), (2025, 12, 31), seeded_at).await?;

    let mut orders = Vec::new();
    // 36178.20 at the 5% brand default
    let big = seed_order(
        db,
        &summit,
        &northwind,
        Some(&spring),
        3_617_820,
        sales_order::Stage::Won,
        None,
        seeded_at,
    )
    .await?;
    seed_structured_payments(
        db,
        big.id,
        &[
            (90_000, Some(naive_date(2025, 2, 1))),
            (50_891, Some(naive_date(2025, 3, 1))),
        ],
        seeded_at,
    )
    .await?;
    orders.push(big);

    // order-level override beats the brand default
    let overridden = seed_order(
        db,
        &lakeside,
        &northwind,
        Some(&spring),
        120_000,
        sales_order::Stage::Won,
        Some(1_000),
        seeded_at,
    )
    .await?;
    orders.push(overridden);

    // legacy import: scalar paid amount, no payment rows
    let legacy = seed_order(
        db,
        &lakeside,
        &cascade,
        Some(&fall),
        80_000,
        sales_order::Stage::Won,
        None,
        seeded_at,
    )
    .await?;
    seed_legacy_scalar(db, legacy.id, 3_000, Some(naive_date(2025, 1, 10)), seeded_at).await?;
    orders.push(legacy);

    let open = seed_order(
        db,
        &pinetree,
        &cascade,
        Some(&fall),
        45_500,
        sales_order::Stage::Open,
        None,
        seeded_at,
    )
    .await?;
    orders.push(open);

    let lost = seed_order(
        db,
        &pinetree,
        &harbor,
        None,
        200_000,
        sales_order::Stage::Lost,
        None,
        seeded_at,
    )
    .await?;
    orders.push(lost);

    let todo_active = todo::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Chase Cascade remittance".to_string()),
        notes_md: Set(None),
        status: Set(todo::Status::Open),
        due_on: Set(Some(naive_date(2025, 4, 15))),
        assignee: Set(None),
        account_id: Set(Some(lakeside.id)),
        completed_at: Set(None),
        created_at: Set(seeded_at),
        updated_at: Set(seeded_at),
    };
    todo::Entity::insert(todo_active)
        .exec_without_returning(db)
        .await?;

    Ok(SeededRecords {
        brands: vec![northwind, cascade, harbor],
        accounts: vec![summit, lakeside, pinetree],
        seasons: vec![spring, fall],
        orders,
    })
}

fn naive_date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid seed date")
}

async fn seed_brand(
    db: &DatabaseConnection,
    name: &str,
    commission_bps: i32,
    seeded_at: DateTimeWithTimeZone,
) -> Result<brand::Model, DbErr> {
    brand::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        commission_bps: Set(commission_bps),
        website: Set(None),
        created_at: Set(seeded_at),
        updated_at: Set(seeded_at),
    }
    .insert(db)
    .await
}

async fn seed_account(
    db: &DatabaseConnection,
    name: &str,
    city: Option<&str>,
    seeded_at: DateTimeWithTimeZone,
) -> Result<account::Model, DbErr> {
    account::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        city: Set(city.map(str::to_string)),
        region: Set(None),
        notes_md: Set(None),
        created_at: Set(seeded_at),
        updated_at: Set(seeded_at),
    }
    .insert(db)
    .await
}

async fn seed_season(
    db: &DatabaseConnection,
    name: &str,
    starts: (i32, u32, u32),
    ends: (i32, u32, u32),
    seeded_at: DateTimeWithTimeZone,
) -> Result<season::Model, DbErr> {
    season::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        starts_on: Set(Some(naive_date(starts.0, starts.1, starts.2))),
        ends_on: Set(Some(naive_date(ends.0, ends.1, ends.2))),
        created_at: Set(seeded_at),
        updated_at: Set(seeded_at),
    }
    .insert(db)
    .await
}

#[allow(clippy::too_many_arguments)]
async fn seed_order(
    db: &DatabaseConnection,
    account: &account::Model,
    brand: &brand::Model,
    season: Option<&season::Model>,
    total_cents: i64,
    stage: sales_order::Stage,
    override_bps: Option<i32>,
    seeded_at: DateTimeWithTimeZone,
) -> Result<sales_order::Model, DbErr> {
    let order = sales_order::ActiveModel {
        id: Set(Uuid::new_v4()),
        account_id: Set(account.id),
        brand_id: Set(brand.id),
        season_id: Set(season.map(|s| s.id)),
        total_cents: Set(total_cents),
        stage: Set(stage),
        commission_override_bps: Set(override_bps),
        ordered_on: Set(None),
        created_at: Set(seeded_at),
        updated_at: Set(seeded_at),
    }
    .insert(db)
    .await?;

    let excluded = load_excluded_stages(db).await?;
    if !excluded.contains(stage.as_str()) {
        let rate = effective_rate_bps(override_bps, brand.commission_bps);
        let due = commission_due_cents(total_cents, rate);
        commission::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            commission_due_cents: Set(due),
            amount_paid_cents: Set(0),
            amount_remaining_cents: Set(due),
            pay_status: Set(classify(0, due)),
            paid_on: Set(None),
            created_at: Set(seeded_at),
            updated_at: Set(seeded_at),
        }
        .insert(db)
        .await?;
    }
    Ok(order)
}

async fn seed_structured_payments(
    db: &DatabaseConnection,
    order_id: Uuid,
    entries: &[(i64, Option<NaiveDate>)],
    seeded_at: DateTimeWithTimeZone,
) -> Result<(), DbErr> {
    let Some(row) = commission::Entity::find()
        .filter(commission::Column::OrderId.eq(order_id))
        .one(db)
        .await?
    else {
        return Ok(());
    };
    for (position, (amount_cents, paid_on)) in entries.iter().enumerate() {
        payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            commission_id: Set(row.id),
            amount_cents: Set(*amount_cents),
            paid_on: Set(*paid_on),
            position: Set(position as i32),
            created_at: Set(seeded_at),
        }
        .insert(db)
        .await?;
    }
    let ledger = Ledger::Structured(
        entries
            .iter()
            .map(|(amount_cents, paid_on)| LedgerEntry {
                amount_cents: *amount_cents,
                paid_on: *paid_on,
            })
            .collect(),
    );
    let state = recompute(row.commission_due_cents, &ledger);
    let mut active: commission::ActiveModel = row.into();
    active.amount_paid_cents = Set(state.amount_paid_cents);
    active.amount_remaining_cents = Set(state.amount_remaining_cents);
    active.pay_status = Set(state.pay_status);
    active.updated_at = Set(seeded_at);
    active.update(db).await?;
    Ok(())
}

async fn seed_legacy_scalar(
    db: &DatabaseConnection,
    order_id: Uuid,
    amount_paid_cents: i64,
    paid_on: Option<NaiveDate>,
    seeded_at: DateTimeWithTimeZone,
) -> Result<(), DbErr> {
    let Some(row) = commission::Entity::find()
        .filter(commission::Column::OrderId.eq(order_id))
        .one(db)
        .await?
    else {
        return Ok(());
    };
    let due = row.commission_due_cents;
    let mut active: commission::ActiveModel = row.into();
    active.amount_paid_cents = Set(amount_paid_cents);
    active.amount_remaining_cents = Set((due - amount_paid_cents).max(0));
    active.pay_status = Set(classify(amount_paid_cents, due));
    active.paid_on = Set(paid_on);
    active.updated_at = Set(seeded_at);
    active.update(db).await?;
    Ok(())
}
