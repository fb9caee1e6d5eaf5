mod common;

use common::{
    add_payment, commission_for_order, create_account, create_brand, create_order, exec, exec_raw,
    has_error_code, setup,
};
use chrono::NaiveDate;
use entity::commission;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn partial_payments_reconcile_through_the_ledger() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Northwind", 500).await;
    let account = create_account(&ctx, "Summit").await;
    let order = create_order(&ctx, &account, &brand, 3_617_820, "WON", None).await;

    let node = add_payment(&ctx, &order, 90_000, Some("2025-02-01")).await;
    assert_eq!(node["amountPaidCents"], 90_000);
    assert_eq!(node["amountRemainingCents"], 90_891);
    assert_eq!(node["payStatus"], "PARTIAL");

    let node = add_payment(&ctx, &order, 90_891, Some("2025-03-01")).await;
    assert_eq!(node["amountPaidCents"], 180_891);
    assert_eq!(node["amountRemainingCents"], 0);
    assert_eq!(node["payStatus"], "PAID");
    let second_id = node["payments"][1]["id"].as_str().unwrap().to_string();

    let data = exec(
        &ctx.schema,
        r#"
        mutation Remove($id: ID!) {
            sales {
                removePayment(id: $id) {
                    amountPaidCents
                    amountRemainingCents
                    payStatus
                }
            }
        }
        "#,
        json!({ "id": second_id }),
    )
    .await;
    let node = &data["sales"]["removePayment"];
    assert_eq!(node["amountPaidCents"], 90_000);
    assert_eq!(node["amountRemainingCents"], 90_891);
    assert_eq!(node["payStatus"], "PARTIAL");
}

#[tokio::test]
async fn add_payment_rejects_non_positive_amounts() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Northwind", 500).await;
    let account = create_account(&ctx, "Summit").await;
    let order = create_order(&ctx, &account, &brand, 100_000, "WON", None).await;

    for amount in [0_i64, -500] {
        let resp = exec_raw(
            &ctx.schema,
            r#"
            mutation Add($input: NewPaymentInput!) {
                sales { addPayment(input: $input) { amountPaidCents } }
            }
            "#,
            json!({ "input": { "orderId": order, "amountCents": amount } }),
        )
        .await;
        assert!(has_error_code(&resp.errors, "VALIDATION"));
    }

    // rejected writes leave the commission untouched
    let node = commission_for_order(&ctx, &order).await;
    assert_eq!(node["amountPaidCents"], 0);
    assert_eq!(node["payStatus"], "UNPAID");
    assert_eq!(node["payments"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn add_payment_without_commission_is_not_found() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Northwind", 500).await;
    let account = create_account(&ctx, "Summit").await;
    let order = create_order(&ctx, &account, &brand, 100_000, "LOST", None).await;

    let resp = exec_raw(
        &ctx.schema,
        r#"
        mutation Add($input: NewPaymentInput!) {
            sales { addPayment(input: $input) { amountPaidCents } }
        }
        "#,
        json!({ "input": { "orderId": order, "amountCents": 1_000 } }),
    )
    .await;
    assert!(has_error_code(&resp.errors, "NOT_FOUND"));
}

#[tokio::test]
async fn overpayment_keeps_true_paid_and_clamps_remaining() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Northwind", 500).await;
    let account = create_account(&ctx, "Summit").await;
    let order = create_order(&ctx, &account, &brand, 100_000, "WON", None).await;

    let node = add_payment(&ctx, &order, 12_000, None).await;
    assert_eq!(node["amountPaidCents"], 12_000);
    assert_eq!(node["amountRemainingCents"], 0);
    assert_eq!(node["payStatus"], "PAID");
}

#[tokio::test]
async fn exact_boundary_payment_is_paid() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Northwind", 500).await;
    let account = create_account(&ctx, "Summit").await;
    let order = create_order(&ctx, &account, &brand, 100_000, "WON", None).await;

    let node = add_payment(&ctx, &order, 5_000, None).await;
    assert_eq!(node["amountPaidCents"], 5_000);
    assert_eq!(node["amountRemainingCents"], 0);
    assert_eq!(node["payStatus"], "PAID");
}

#[tokio::test]
async fn update_payment_recomputes_aggregates() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Northwind", 500).await;
    let account = create_account(&ctx, "Summit").await;
    let order = create_order(&ctx, &account, &brand, 100_000, "WON", None).await;

    let node = add_payment(&ctx, &order, 2_000, Some("2025-02-01")).await;
    let payment_id = node["payments"][0]["id"].as_str().unwrap().to_string();

    let data = exec(
        &ctx.schema,
        r#"
        mutation Update($input: UpdatePaymentInput!) {
            sales {
                updatePayment(input: $input) {
                    amountPaidCents
                    amountRemainingCents
                    payStatus
                    payments { amountCents paidOn }
                }
            }
        }
        "#,
        json!({ "input": { "id": payment_id, "amountCents": 5_000, "paidOn": null } }),
    )
    .await;
    let node = &data["sales"]["updatePayment"];
    assert_eq!(node["amountPaidCents"], 5_000);
    assert_eq!(node["amountRemainingCents"], 0);
    assert_eq!(node["payStatus"], "PAID");
    assert!(node["payments"][0]["paidOn"].is_null());
}

#[tokio::test]
async fn update_payment_rejects_non_positive_amount() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Northwind", 500).await;
    let account = create_account(&ctx, "Summit").await;
    let order = create_order(&ctx, &account, &brand, 100_000, "WON", None).await;
    let node = add_payment(&ctx, &order, 2_000, None).await;
    let payment_id = node["payments"][0]["id"].as_str().unwrap().to_string();

    let resp = exec_raw(
        &ctx.schema,
        r#"
        mutation Update($input: UpdatePaymentInput!) {
            sales { updatePayment(input: $input) { amountPaidCents } }
        }
        "#,
        json!({ "input": { "id": payment_id, "amountCents": 0 } }),
    )
    .await;
    assert!(has_error_code(&resp.errors, "VALIDATION"));

    let node = commission_for_order(&ctx, &order).await;
    assert_eq!(node["amountPaidCents"], 2_000);
}

#[tokio::test]
async fn legacy_scalar_materializes_before_first_structured_payment() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Cascade", 750).await;
    let account = create_account(&ctx, "Lakeside").await;
    let order = create_order(&ctx, &account, &brand, 80_000, "WON", None).await;

    // shape the row like a legacy import: scalar paid amount, no payment rows
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
    active.paid_on = Set(Some(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()));
    active.update(ctx.db.as_ref()).await.unwrap();

    let node = add_payment(&ctx, &order, 1_500, Some("2025-02-15")).await;
    assert_eq!(node["amountPaidCents"], 4_500);
    let payments = node["payments"].as_array().unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0]["amountCents"], 3_000);
    assert_eq!(payments[0]["paidOn"], "2025-01-10");
    assert_eq!(payments[0]["position"], 0);
    assert_eq!(payments[1]["amountCents"], 1_500);
    assert_eq!(payments[1]["position"], 1);
}

#[tokio::test]
async fn positions_stay_sequential_after_remove_then_add() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Northwind", 500).await;
    let account = create_account(&ctx, "Summit").await;
    let order = create_order(&ctx, &account, &brand, 100_000, "WON", None).await;

    add_payment(&ctx, &order, 1_000, Some("2025-01-01")).await;
    let node = add_payment(&ctx, &order, 2_000, Some("2025-01-02")).await;
    let first_id = node["payments"][0]["id"].as_str().unwrap().to_string();

    exec(
        &ctx.schema,
        r#"
        mutation Remove($id: ID!) {
            sales { removePayment(id: $id) { id } }
        }
        "#,
        json!({ "id": first_id }),
    )
    .await;

    let node = add_payment(&ctx, &order, 3_000, None).await;
    let payments = node["payments"].as_array().unwrap();
    let positions: Vec<i64> = payments
        .iter()
        .map(|p| p["position"].as_i64().unwrap())
        .collect();
    assert_eq!(positions, vec![0, 1]);
    assert_eq!(payments[0]["amountCents"], 2_000);
    assert_eq!(payments[1]["amountCents"], 3_000);
    assert_eq!(node["amountPaidCents"], 5_000);
}

#[tokio::test]
async fn desynced_ledger_sum_blocks_payment_edits() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Northwind", 500).await;
    let account = create_account(&ctx, "Summit").await;
    let order = create_order(&ctx, &account, &brand, 100_000, "WON", None).await;
    let node = add_payment(&ctx, &order, 2_000, None).await;
    let payment_id = node["payments"][0]["id"].as_str().unwrap().to_string();

    // desync the stored aggregate from the ledger, as a bypassing writer would
    let order_id = Uuid::parse_str(&order).unwrap();
    let row = commission::Entity::find()
        .filter(commission::Column::OrderId.eq(order_id))
        .one(ctx.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    let mut active: commission::ActiveModel = row.into();
    active.amount_paid_cents = Set(999);
    active.update(ctx.db.as_ref()).await.unwrap();

    let resp = exec_raw(
        &ctx.schema,
        r#"
        mutation Update($input: UpdatePaymentInput!) {
            sales { updatePayment(input: $input) { amountPaidCents } }
        }
        "#,
        json!({ "input": { "id": payment_id, "amountCents": 5_000 } }),
    )
    .await;
    assert!(has_error_code(&resp.errors, "INTERNAL"));

    let resp = exec_raw(
        &ctx.schema,
        r#"
        mutation Remove($id: ID!) {
            sales { removePayment(id: $id) { amountPaidCents } }
        }
        "#,
        json!({ "id": payment_id }),
    )
    .await;
    assert!(has_error_code(&resp.errors, "INTERNAL"));

    // the rejected edits leave both the row and the ledger alone
    let node = commission_for_order(&ctx, &order).await;
    assert_eq!(node["amountPaidCents"], 999);
    assert_eq!(node["payments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn removing_last_payment_returns_to_unpaid() {
    let ctx = setup().await;
    let brand = create_brand(&ctx, "Northwind", 500).await;
    let account = create_account(&ctx, "Summit").await;
    let order = create_order(&ctx, &account, &brand, 100_000, "WON", None).await;
    let node = add_payment(&ctx, &order, 2_000, None).await;
    let payment_id = node["payments"][0]["id"].as_str().unwrap().to_string();

    let data = exec(
        &ctx.schema,
        r#"
        mutation Remove($id: ID!) {
            sales {
                removePayment(id: $id) {
                    amountPaidCents
                    amountRemainingCents
                    payStatus
                    payments { id }
                }
            }
        }
        "#,
        json!({ "id": payment_id }),
    )
    .await;
    let node = &data["sales"]["removePayment"];
    assert_eq!(node["amountPaidCents"], 0);
    assert_eq!(node["amountRemainingCents"], 5_000);
    assert_eq!(node["payStatus"], "UNPAID");
    assert_eq!(node["payments"].as_array().unwrap().len(), 0);
}
