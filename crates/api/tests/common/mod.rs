#![allow(dead_code)]

use std::sync::Arc;

use api::schema::{build_schema, AppSchema};
use async_graphql::{Request, Variables};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};
use serde_json::Value;

pub type TestSchema = async_graphql::Schema<
    api::schema::QueryRoot,
    api::schema::MutationRoot,
    async_graphql::EmptySubscription,
>;

pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub schema: TestSchema,
}

pub async fn setup() -> TestContext {
    let conn = Database::connect("sqlite::memory:").await.unwrap();
    let db = Arc::new(conn);
    bootstrap_sqlite(db.as_ref()).await;
    api::schema::ensure_stage_meta_defaults(db.as_ref())
        .await
        .unwrap();
    let AppSchema(schema) = build_schema(db.clone());
    TestContext { db, schema }
}

async fn bootstrap_sqlite(db: &DatabaseConnection) {
    db.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        "PRAGMA foreign_keys = ON;",
    ))
    .await
    .unwrap();

    for ddl in [
        r#"
        CREATE TABLE brand (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            commission_bps INTEGER NOT NULL DEFAULT 0,
            website TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
        r#"
        CREATE TABLE account (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            city TEXT,
            region TEXT,
            notes_md TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
        r#"
        CREATE TABLE season (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            starts_on TEXT,
            ends_on TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
        r#"
        CREATE TABLE sales_order (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            brand_id TEXT NOT NULL,
            season_id TEXT,
            total_cents INTEGER NOT NULL DEFAULT 0,
            stage TEXT NOT NULL DEFAULT 'OPEN',
            commission_override_bps INTEGER,
            ordered_on TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(account_id) REFERENCES account(id) ON DELETE CASCADE,
            FOREIGN KEY(brand_id) REFERENCES brand(id) ON DELETE CASCADE
        );
        "#,
        r#"
        CREATE TABLE commission (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL UNIQUE,
            commission_due_cents INTEGER NOT NULL DEFAULT 0,
            amount_paid_cents INTEGER NOT NULL DEFAULT 0,
            amount_remaining_cents INTEGER NOT NULL DEFAULT 0,
            pay_status TEXT NOT NULL DEFAULT 'UNPAID',
            paid_on TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
        r#"
        CREATE TABLE payment (
            id TEXT PRIMARY KEY,
            commission_id TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            paid_on TEXT,
            position INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(commission_id) REFERENCES commission(id) ON DELETE CASCADE
        );
        "#,
        r#"
        CREATE TABLE stage_meta (
            key TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            is_excluded INTEGER NOT NULL DEFAULT 0
        );
        "#,
        r#"
        CREATE TABLE todo (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            notes_md TEXT,
            status TEXT NOT NULL DEFAULT 'OPEN',
            due_on TEXT,
            assignee TEXT,
            account_id TEXT,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(account_id) REFERENCES account(id) ON DELETE SET NULL
        );
        "#,
    ] {
        db.execute(Statement::from_string(DatabaseBackend::Sqlite, ddl))
            .await
            .unwrap();
    }
}

pub async fn exec(schema: &TestSchema, query: &str, vars: Value) -> Value {
    let resp = schema
        .execute(Request::new(query).variables(Variables::from_json(vars)))
        .await;
    assert!(
        resp.errors.is_empty(),
        "unexpected errors: {:?}",
        resp.errors
    );
    resp.data.into_json().unwrap()
}

pub async fn exec_raw(schema: &TestSchema, query: &str, vars: Value) -> async_graphql::Response {
    schema
        .execute(Request::new(query).variables(Variables::from_json(vars)))
        .await
}

pub fn has_error_code(errors: &[async_graphql::ServerError], code: &str) -> bool {
    errors.iter().any(|e| {
        matches!(
            e.extensions.as_ref().and_then(|ext| ext.get("code")),
            Some(async_graphql::Value::String(s)) if s == code
        )
    })
}

pub async fn create_brand(ctx: &TestContext, name: &str, commission_bps: i32) -> String {
    let data = exec(
        &ctx.schema,
        r#"
        mutation Create($input: NewBrandInput!) {
            sales { createBrand(input: $input) { id } }
        }
        "#,
        serde_json::json!({ "input": { "name": name, "commissionBps": commission_bps } }),
    )
    .await;
    data["sales"]["createBrand"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

pub async fn create_account(ctx: &TestContext, name: &str) -> String {
    let data = exec(
        &ctx.schema,
        r#"
        mutation Create($input: NewAccountInput!) {
            sales { createAccount(input: $input) { id } }
        }
        "#,
        serde_json::json!({ "input": { "name": name } }),
    )
    .await;
    data["sales"]["createAccount"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

pub async fn create_season(ctx: &TestContext, name: &str) -> String {
    let data = exec(
        &ctx.schema,
        r#"
        mutation Create($input: NewSeasonInput!) {
            sales { createSeason(input: $input) { id } }
        }
        "#,
        serde_json::json!({ "input": { "name": name } }),
    )
    .await;
    data["sales"]["createSeason"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

pub async fn create_order(
    ctx: &TestContext,
    account_id: &str,
    brand_id: &str,
    total_cents: i64,
    stage: &str,
    override_bps: Option<i32>,
) -> String {
    let mut input = serde_json::json!({
        "accountId": account_id,
        "brandId": brand_id,
        "totalCents": total_cents,
        "stage": stage,
    });
    if let Some(rate) = override_bps {
        input["commissionOverrideBps"] = serde_json::json!(rate);
    }
    let data = exec(
        &ctx.schema,
        r#"
        mutation Create($input: NewOrderInput!) {
            sales { createOrder(input: $input) { id } }
        }
        "#,
        serde_json::json!({ "input": input }),
    )
    .await;
    data["sales"]["createOrder"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

pub async fn commission_for_order(ctx: &TestContext, order_id: &str) -> Value {
    let data = exec(
        &ctx.schema,
        r#"
        query Commission($orderId: ID!) {
            sales {
                commission(orderId: $orderId) {
                    id
                    commissionDueCents
                    amountPaidCents
                    amountRemainingCents
                    payStatus
                    paidOn
                    payments { id amountCents paidOn position }
                }
            }
        }
        "#,
        serde_json::json!({ "orderId": order_id }),
    )
    .await;
    data["sales"]["commission"].clone()
}

pub async fn add_payment(
    ctx: &TestContext,
    order_id: &str,
    amount_cents: i64,
    paid_on: Option<&str>,
) -> Value {
    let mut input = serde_json::json!({
        "orderId": order_id,
        "amountCents": amount_cents,
    });
    if let Some(date) = paid_on {
        input["paidOn"] = serde_json::json!(date);
    }
    let data = exec(
        &ctx.schema,
        r#"
        mutation Add($input: NewPaymentInput!) {
            sales {
                addPayment(input: $input) {
                    amountPaidCents
                    amountRemainingCents
                    payStatus
                    payments { id amountCents paidOn position }
                }
            }
        }
        "#,
        serde_json::json!({ "input": input }),
    )
    .await;
    data["sales"]["addPayment"].clone()
}
