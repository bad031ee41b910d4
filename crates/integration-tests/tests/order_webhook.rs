//! Payment webhook finalization: exactly one order per approved payment,
//! applied atomically, under at-least-once delivery.

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use verbena_core::{AddressId, PaymentId, UserId};
use verbena_integration_tests::{TOKEN_USER_1, TOKEN_USER_2, TestContext};
use verbena_storefront::models::CartKey;
use verbena_storefront::payments::{FrozenLine, Payment, PaymentMetadata, PaymentStatus};
use verbena_storefront::store::DocumentStore;

fn seed_address(ctx: &TestContext, id: &str, owner: &str) {
    ctx.store.seed(
        "addresses",
        id,
        json!({
            "owner_id": owner,
            "first_name": "Ana",
            "last_name": "Reyes",
            "email": "ana@example.com",
            "phone": "5550001111",
            "street": "Av. Reforma 100",
            "neighborhood": "Centro",
            "city": "CDMX",
            "state": "CDMX",
            "zipcode": "06000",
            "country": "MX",
            "reference": "blue door",
            "is_default": true,
        }),
    );
}

fn approved_payment(payment_id: &str, owner: &str, quantity: u32) -> Payment {
    Payment {
        id: PaymentId::new(payment_id),
        status: PaymentStatus::Approved,
        metadata: PaymentMetadata {
            owner_id: UserId::new(owner),
            address_id: AddressId::new("adr-1"),
            lines: vec![FrozenLine {
                key: CartKey::product("sku-1"),
                quantity,
            }],
            shipping_cost: dec!(95),
            tax: dec!(0),
        },
        payment_method: Some("credit_card".to_owned()),
    }
}

fn notification(payment_id: &str) -> Value {
    json!({
        "type": "payment",
        "action": "payment.created",
        "data": {"id": payment_id},
    })
}

/// Context with a seeded product, address, cart line, and approved payment.
async fn prepared() -> TestContext {
    let ctx = TestContext::new();
    ctx.seed_product("sku-1", "Candle", "100.00", 7);
    seed_address(&ctx, "adr-1", "u1");
    ctx.post(
        "/cart/add",
        Some(TOKEN_USER_1),
        json!({"product_id": "sku-1", "quantity": 2}),
    )
    .await;
    ctx.gateway
        .insert_payment(approved_payment("pay-1", "u1", 2));
    ctx
}

#[tokio::test]
async fn test_approved_payment_finalizes_atomically() {
    let ctx = prepared().await;

    let (status, body) = ctx.post("/webhooks/payments", None, notification("pay-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "finalized");
    assert_eq!(body["order_id"], "ord_pay-1");

    // Order visible to its owner with the frozen amounts.
    let (_, orders) = ctx.get("/orders", Some(TOKEN_USER_1)).await;
    let orders = orders.as_array().expect("array");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["subtotal"], "200.00");
    assert_eq!(orders[0]["shipping_cost"], "95");
    assert_eq!(orders[0]["grand_total"], "295.00");
    assert_eq!(orders[0]["status"], "pending");
    assert_eq!(orders[0]["shipping_address"]["zipcode"], "06000");

    // Paid lines left the cart; the sales counter moved.
    let (_, cart) = ctx.get("/cart", Some(TOKEN_USER_1)).await;
    assert!(cart.as_array().expect("array").is_empty());
    let product = ctx
        .store
        .get("products", "sku-1")
        .await
        .expect("get")
        .expect("product");
    assert_eq!(product["total_sales"], 9);
}

#[tokio::test]
async fn test_duplicate_notification_yields_one_order() {
    let ctx = prepared().await;

    let (_, first) = ctx.post("/webhooks/payments", None, notification("pay-1")).await;
    let (status, second) = ctx.post("/webhooks/payments", None, notification("pay-1")).await;

    assert_eq!(first["outcome"], "finalized");
    assert_eq!(status, StatusCode::OK, "retry must be acknowledged");
    assert_eq!(second["outcome"], "already_processed");
    assert_eq!(second["order_id"], "ord_pay-1");

    let (_, orders) = ctx.get("/orders", Some(TOKEN_USER_1)).await;
    assert_eq!(orders.as_array().expect("array").len(), 1);

    let product = ctx
        .store
        .get("products", "sku-1")
        .await
        .expect("get")
        .expect("product");
    assert_eq!(product["total_sales"], 9, "sales counted exactly once");
}

#[tokio::test]
async fn test_other_notification_kinds_are_acknowledged_untouched() {
    let ctx = prepared().await;

    for payload in [
        json!({"type": "plan", "action": "payment.created", "data": {"id": "pay-1"}}),
        json!({"type": "payment", "action": "payment.updated", "data": {"id": "pay-1"}}),
    ] {
        let (status, body) = ctx.post("/webhooks/payments", None, payload).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "ignored");
    }

    let (_, orders) = ctx.get("/orders", Some(TOKEN_USER_1)).await;
    assert!(orders.as_array().expect("array").is_empty());
}

#[tokio::test]
async fn test_unapproved_payment_creates_no_order() {
    let ctx = prepared().await;
    let mut payment = approved_payment("pay-2", "u1", 2);
    payment.status = PaymentStatus::Rejected;
    ctx.gateway.insert_payment(payment);

    let (status, body) = ctx.post("/webhooks/payments", None, notification("pay-2")).await;
    assert_eq!(status, StatusCode::OK, "acknowledged so the provider stops");
    assert_eq!(body["outcome"], "payment_not_approved");

    let (_, cart) = ctx.get("/cart", Some(TOKEN_USER_1)).await;
    assert_eq!(cart.as_array().expect("array").len(), 1, "cart untouched");
}

#[tokio::test]
async fn test_unknown_payment_fails_for_retry() {
    let ctx = prepared().await;
    let (status, _) = ctx.post("/webhooks/payments", None, notification("pay-404")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_failed_commit_recovers_on_redelivery() {
    let ctx = prepared().await;

    ctx.store.fail_next_commit();
    let (status, _) = ctx.post("/webhooks/payments", None, notification("pay-1")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // Nothing was applied by the failed attempt.
    let (_, cart) = ctx.get("/cart", Some(TOKEN_USER_1)).await;
    assert_eq!(cart.as_array().expect("array").len(), 1);
    let product = ctx
        .store
        .get("products", "sku-1")
        .await
        .expect("get")
        .expect("product");
    assert_eq!(product["total_sales"], 7);

    // The provider redelivers; this time everything lands.
    let (status, body) = ctx.post("/webhooks/payments", None, notification("pay-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "finalized");
}

#[tokio::test]
async fn test_orders_are_private_to_their_owner() {
    let ctx = prepared().await;
    ctx.post("/webhooks/payments", None, notification("pay-1")).await;

    let (_, orders) = ctx.get("/orders", Some(TOKEN_USER_2)).await;
    assert!(orders.as_array().expect("array").is_empty());

    let (status, _) = ctx.get("/orders/ord_pay-1", Some(TOKEN_USER_2)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx.get("/orders/ord_pay-1", Some(TOKEN_USER_1)).await;
    assert_eq!(status, StatusCode::OK);
}
