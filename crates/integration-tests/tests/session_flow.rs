//! Session lifecycle over the HTTP surface: cookie attributes on login,
//! renewal, and logout.

use axum::http::{StatusCode, header};
use serde_json::json;

use verbena_integration_tests::{TOKEN_USER_1, TestContext};

fn set_cookie(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("Set-Cookie header")
        .to_str()
        .expect("ascii")
        .to_owned()
}

#[tokio::test]
async fn test_login_sets_day_long_session_cookie() {
    let ctx = TestContext::new();
    let response = ctx
        .request_raw(
            "POST",
            "/auth/login",
            None,
            Some(json!({"credential": TOKEN_USER_1})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    // Test config serves over http, so no Secure attribute.
    assert_eq!(
        set_cookie(&response),
        "session=tok-u1; Path=/; Max-Age=86400; HttpOnly; SameSite=Strict"
    );
}

#[tokio::test]
async fn test_renew_extends_session_to_a_week() {
    let ctx = TestContext::new();
    let response = ctx
        .request_raw("POST", "/auth/renew", Some(TOKEN_USER_1), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        set_cookie(&response),
        "session=tok-u1; Path=/; Max-Age=604800; HttpOnly; SameSite=Strict"
    );
}

#[tokio::test]
async fn test_renew_without_cookie_is_unauthorized() {
    let ctx = TestContext::new();
    let (status, _) = ctx.post("/auth/renew", None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_renew_with_stale_token_is_unauthorized() {
    let ctx = TestContext::new();
    let response = ctx
        .request_raw("POST", "/auth/renew", Some("tok-expired"), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_the_cookie() {
    let ctx = TestContext::new();
    let response = ctx
        .request_raw("POST", "/auth/logout", Some(TOKEN_USER_1), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        set_cookie(&response),
        "session=; Path=/; Max-Age=0; HttpOnly; SameSite=Strict"
    );
}

#[tokio::test]
async fn test_login_with_unknown_credential_is_rejected() {
    let ctx = TestContext::new();
    let (status, _) = ctx
        .post("/auth/login", None, json!({"credential": "nobody"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
