//! Checkout pricing: quote selection, free-shipping threshold, and
//! preference creation over the HTTP surface.

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use verbena_integration_tests::{TOKEN_USER_1, TestContext, rate_quote};

fn address_body() -> Value {
    json!({
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
    })
}

/// Seed a product, put `quantity` of it in the user's cart, and create an
/// address; returns the address id.
async fn prepare_checkout(ctx: &TestContext, price: &str, quantity: u32) -> String {
    ctx.seed_product("sku-1", "Candle", price, 0);
    ctx.post(
        "/cart/add",
        Some(TOKEN_USER_1),
        json!({"product_id": "sku-1", "quantity": quantity}),
    )
    .await;
    let (status, address) = ctx
        .post("/addresses", Some(TOKEN_USER_1), address_body())
        .await;
    assert_eq!(status, StatusCode::CREATED);
    address["id"].as_str().expect("address id").to_owned()
}

#[tokio::test]
async fn test_cheapest_successful_quote_selected() {
    let ctx = TestContext::with_quotes(vec![
        rate_quote("A", dec!(120), true),
        rate_quote("B", dec!(95), true),
        rate_quote("C", dec!(95), false),
    ]);
    let address_id = prepare_checkout(&ctx, "100.00", 2).await;

    let (status, body) = ctx
        .post(
            "/checkout/quote",
            Some(TOKEN_USER_1),
            json!({"address_id": address_id}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selected"]["carrier"], "B", "cheapest successful wins");
    assert_eq!(body["totals"]["subtotal"], "200.00");
    assert_eq!(body["totals"]["shipping_cost"], "95");
    assert_eq!(body["totals"]["grand_total"], "295.00");
}

#[tokio::test]
async fn test_equal_price_ties_break_by_first_seen() {
    let ctx = TestContext::with_quotes(vec![
        rate_quote("A", dec!(95), true),
        rate_quote("B", dec!(95), true),
    ]);
    let address_id = prepare_checkout(&ctx, "100.00", 1).await;

    let (_, body) = ctx
        .post(
            "/checkout/quote",
            Some(TOKEN_USER_1),
            json!({"address_id": address_id}),
        )
        .await;
    assert_eq!(body["selected"]["carrier"], "A");
}

#[tokio::test]
async fn test_subtotal_at_threshold_ships_free() {
    let ctx = TestContext::new();
    // 3 x 333.00 = 999.00, exactly the configured threshold.
    let address_id = prepare_checkout(&ctx, "333.00", 3).await;

    let (_, body) = ctx
        .post(
            "/checkout/quote",
            Some(TOKEN_USER_1),
            json!({"address_id": address_id}),
        )
        .await;
    assert_eq!(body["totals"]["subtotal"], "999.00");
    assert_eq!(body["totals"]["shipping_cost"], "0");
    assert_eq!(body["totals"]["grand_total"], "999.00");
}

#[tokio::test]
async fn test_subtotal_below_threshold_pays_quoted_rate() {
    let ctx = TestContext::new();
    let address_id = prepare_checkout(&ctx, "998.99", 1).await;

    let (_, body) = ctx
        .post(
            "/checkout/quote",
            Some(TOKEN_USER_1),
            json!({"address_id": address_id}),
        )
        .await;
    assert_eq!(body["totals"]["shipping_cost"], "95");
}

#[tokio::test]
async fn test_no_successful_quotes_is_bad_gateway() {
    let ctx = TestContext::with_quotes(vec![rate_quote("A", dec!(120), false)]);
    let address_id = prepare_checkout(&ctx, "100.00", 1).await;

    let (status, _) = ctx
        .post(
            "/checkout/quote",
            Some(TOKEN_USER_1),
            json!({"address_id": address_id}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_empty_cart_cannot_check_out() {
    let ctx = TestContext::new();
    let (status, address) = ctx
        .post("/addresses", Some(TOKEN_USER_1), address_body())
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = ctx
        .post(
            "/checkout/quote",
            Some(TOKEN_USER_1),
            json!({"address_id": address["id"]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_vanished_product_aborts_pricing() {
    let ctx = TestContext::new();
    let address_id = prepare_checkout(&ctx, "100.00", 1).await;
    // A second cart line whose product never existed.
    ctx.post(
        "/cart/add",
        Some(TOKEN_USER_1),
        json!({"product_id": "ghost", "quantity": 1}),
    )
    .await;

    let (status, _) = ctx
        .post(
            "/checkout/quote",
            Some(TOKEN_USER_1),
            json!({"address_id": address_id}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_preference_freezes_lines_and_amounts() {
    let ctx = TestContext::new();
    let address_id = prepare_checkout(&ctx, "100.00", 2).await;

    let (status, body) = ctx
        .post(
            "/checkout/preference",
            Some(TOKEN_USER_1),
            json!({"address_id": address_id}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preference_id"], "pref-test");
    assert_eq!(body["redirect_url"], "https://pay.test/pref-test");

    let requests = ctx.gateway.requests();
    assert_eq!(requests.len(), 1);
    let metadata = &requests[0].metadata;
    assert_eq!(metadata.owner_id.as_str(), "u1");
    assert_eq!(metadata.address_id.as_str(), address_id);
    assert_eq!(metadata.lines.len(), 1);
    assert_eq!(metadata.lines[0].quantity, 2);
    assert_eq!(metadata.shipping_cost, dec!(95));
    assert_eq!(metadata.tax, dec!(0));
}

#[tokio::test]
async fn test_checkout_requires_authentication() {
    let ctx = TestContext::new();
    let (status, _) = ctx
        .post("/checkout/quote", None, json!({"address_id": "adr-1"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
