mod common;

use chrono::Utc;
use common::{
    add_payment, create_account, create_brand, create_order, create_season, exec, setup,
    TestContext,
};
use entity::commission;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use serde_json::{json, Value};
use uuid::Uuid;

async fn summary(ctx: &TestContext, filter: Value) -> Value {
    let data = exec(
        &ctx.schema,
        r#"
        query Summary($filter: SummaryFilterInput) {
            sales {
                commissionSummary(filter: $filter) {
                    totalSalesCents
                    commissionEarnedCents
                    commissionPaidCents
                    commissionOutstandingCents
                }
            }
        }
        "#,
        json!({ "filter": filter }),
    )
    .await;
    data["sales"]["commissionSummary"].clone()
}

async fn report(ctx: &TestContext, filter: Value) -> Vec<Value> {
    let data = exec(
        &ctx.schema,
        r#"
        query Report($filter: SummaryFilterInput) {
            sales {
                paymentReport(filter: $filter) {
                    paidOn
                    subtotalCents
                    entryCount
                }
            }
        }
        "#,
        json!({ "filter": filter }),
    )
    .await;
    data["sales"]["paymentReport"].as_array().unwrap().clone()
}

#[tokio::test]
async fn summary_drops_excluded_stages_and_applies_filters() {
    let ctx = setup().await;
    let brand_a = create_brand(&ctx, "Northwind", 500).await;
    let brand_b = create_brand(&ctx, "Cascade", 750).await;
    let season = create_season(&ctx, "Spring 2025").await;
    let account = create_account(&ctx, "Summit").await;

    let in_season = json!({
        "accountId": account,
        "brandId": brand_a,
        "seasonId": season,
        "totalCents": 100_000,
        "stage": "WON",
    });
    exec(
        &ctx.schema,
        r#"
        mutation Create($input: NewOrderInput!) {
            sales { createOrder(input: $input) { id } }
        }
        "#,
        json!({ "input": in_season }),
    )
    .await;
    // out of season, other brand, and an excluded stage
    create_order(&ctx, &account, &brand_a, 40_000, "WON", None).await;
    create_order(&ctx, &account, &brand_b, 70_000, "WON", None).await;
    create_order(&ctx, &account, &brand_a, 999_999, "VOID", None).await;

    let all = summary(&ctx, Value::Null).await;
    assert_eq!(all["totalSalesCents"], 210_000);
    // round(140000 * 5%) + round(70000 * 7.5%) = 7000 + 5250
    assert_eq!(all["commissionEarnedCents"], 12_250);

    let filtered = summary(
        &ctx,
        json!({ "brandId": brand_a, "seasonIds": [season] }),
    )
    .await;
    assert_eq!(filtered["totalSalesCents"], 100_000);
    assert_eq!(filtered["commissionEarnedCents"], 5_000);
    assert_eq!(filtered["commissionPaidCents"], 0);
    assert_eq!(filtered["commissionOutstandingCents"], 5_000);
}

#[tokio::test]
async fn summary_rounds_once_per_brand() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Northwind", 500).await;
    let account = create_account(&ctx, "Summit").await;
    for total in [1_010, 1_030, 1_050] {
        create_order(&ctx, &account, &brand, total, "WON", None).await;
    }

    let node = summary(&ctx, Value::Null).await;
    assert_eq!(node["totalSalesCents"], 3_090);
    // one rounding over the brand total, not three per-order roundings
    assert_eq!(node["commissionEarnedCents"], 155);
}

#[tokio::test]
async fn summary_counts_override_orders_at_their_own_rate() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Northwind", 500).await;
    let account = create_account(&ctx, "Summit").await;
    create_order(&ctx, &account, &brand, 100_000, "WON", Some(1_000)).await;
    create_order(&ctx, &account, &brand, 50_000, "WON", None).await;

    let node = summary(&ctx, Value::Null).await;
    assert_eq!(node["commissionEarnedCents"], 12_500);
}

#[tokio::test]
async fn summary_skips_orphaned_commissions() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Northwind", 500).await;
    let account = create_account(&ctx, "Summit").await;
    let order = create_order(&ctx, &account, &brand, 100_000, "WON", None).await;
    add_payment(&ctx, &order, 1_000, None).await;

    // a row left behind by an import, pointing at an order that is gone
    let now = Utc::now().into();
    commission::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(Uuid::new_v4()),
        commission_due_cents: Set(9_999),
        amount_paid_cents: Set(9_999),
        amount_remaining_cents: Set(0),
        pay_status: Set(commission::PayStatus::Paid),
        paid_on: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(ctx.db.as_ref())
    .await
    .unwrap();

    let node = summary(&ctx, Value::Null).await;
    assert_eq!(node["commissionPaidCents"], 1_000);

    let groups = report(&ctx, Value::Null).await;
    let grouped: i64 = groups.iter().map(|g| g["subtotalCents"].as_i64().unwrap()).sum();
    assert_eq!(grouped, 1_000);
}

#[tokio::test]
async fn payment_report_groups_by_date_with_unscheduled_last() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Northwind", 500).await;
    let account = create_account(&ctx, "Summit").await;
    let order_a = create_order(&ctx, &account, &brand, 3_617_820, "WON", None).await;
    let order_b = create_order(&ctx, &account, &brand, 100_000, "WON", None).await;

    add_payment(&ctx, &order_a, 90_000, Some("2025-02-01")).await;
    add_payment(&ctx, &order_a, 50_891, Some("2025-02-01")).await;
    add_payment(&ctx, &order_a, 40_000, None).await;
    add_payment(&ctx, &order_b, 3_000, Some("2025-01-10")).await;

    let groups = report(&ctx, Value::Null).await;
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0]["paidOn"], "2025-01-10");
    assert_eq!(groups[0]["subtotalCents"], 3_000);
    assert_eq!(groups[1]["paidOn"], "2025-02-01");
    assert_eq!(groups[1]["subtotalCents"], 140_891);
    assert_eq!(groups[1]["entryCount"], 2);
    assert!(groups[2]["paidOn"].is_null());
    assert_eq!(groups[2]["subtotalCents"], 40_000);

    // the consistency check: group subtotals equal the summary's paid figure
    let node = summary(&ctx, Value::Null).await;
    let grouped: i64 = groups.iter().map(|g| g["subtotalCents"].as_i64().unwrap()).sum();
    assert_eq!(node["commissionPaidCents"], grouped);
}

#[tokio::test]
async fn payment_report_applies_legacy_scalar_rule() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Cascade", 750).await;
    let account = create_account(&ctx, "Lakeside").await;
    let order = create_order(&ctx, &account, &brand, 80_000, "WON", None).await;

    let order_id = Uuid::parse_str(&order).unwrap();
    let row = commission::Entity::find()
        .filter(commission::Column::OrderId.eq(order_id))
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    let due = row.commission_due_cents;
    let mut active: commission::ActiveModel = row.into();
    active.amount_paid_cents = Set(3_000);
    active.amount_remaining_cents = Set(due - 3_000);
    active.pay_status = Set(commission::PayStatus::Partial);
    active.paid_on = Set(Some(chrono::NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()));
    active.update(ctx.db.as_ref()).await.unwrap();

    let groups = report(&ctx, Value::Null).await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["paidOn"], "2025-01-10");
    assert_eq!(groups[0]["subtotalCents"], 3_000);
    assert_eq!(groups[0]["entryCount"], 1);
}

#[tokio::test]
async fn seed_demo_produces_consistent_reports() {
    let ctx = setup().await;
    let seeded = api::schema::seed_demo(ctx.db.as_ref()).await.unwrap();
    let big = seeded.order_for("Summit Outfitters", "Northwind Apparel").unwrap();
    assert_eq!(big.total_cents, 3_617_820);

    let node = summary(&ctx, Value::Null).await;
    assert!(node["totalSalesCents"].as_i64().unwrap() > 0);

    let groups = report(&ctx, Value::Null).await;
    let grouped: i64 = groups.iter().map(|g| g["subtotalCents"].as_i64().unwrap()).sum();
    assert_eq!(node["commissionPaidCents"].as_i64().unwrap(), grouped);
}
