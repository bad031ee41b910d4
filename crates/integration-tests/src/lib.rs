//! Integration test harness for Verbena.
//!
//! Assembles a full [`AppState`] over in-memory doubles - document store,
//! static identity provider, canned payment gateway and rate provider -
//! and drives the real router with `tower::ServiceExt::oneshot`. No
//! network, no external services.
//!
//! ```rust,ignore
//! let ctx = TestContext::new();
//! ctx.seed_product("sku-1", "Candle", "100.00", 0);
//! let (status, body) = ctx.get("/cart", Some(TOKEN_USER_1)).await;
//! assert_eq!(status, StatusCode::OK);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use verbena_core::{PaymentId, PreferenceId, UserId};
use verbena_storefront::config::{
    IdentityConfig, PaymentsConfig, ShippingConfig, StorefrontConfig,
};
use verbena_storefront::guest::GuestStore;
use verbena_storefront::identity::StaticIdentityProvider;
use verbena_storefront::payments::{
    Payment, PaymentError, PaymentGateway, Preference, PreferenceRequest,
};
use verbena_storefront::routes;
use verbena_storefront::shipping::{
    ParcelSpec, RateProvider, RateQuote, ShippingError, Waypoint,
};
use verbena_storefront::state::AppState;
use verbena_storefront::store::MemoryStore;

/// Session token for the first test user.
pub const TOKEN_USER_1: &str = "tok-u1";
/// Session token for the second test user.
pub const TOKEN_USER_2: &str = "tok-u2";

/// Payment gateway double: records preference requests and serves canned
/// payments.
#[derive(Default)]
pub struct FakePaymentGateway {
    payments: Mutex<HashMap<String, Payment>>,
    requests: Mutex<Vec<PreferenceRequest>>,
}

impl FakePaymentGateway {
    /// Register a payment to be returned by `fetch_payment`.
    pub fn insert_payment(&self, payment: Payment) {
        self.payments
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(payment.id.as_str().to_owned(), payment);
    }

    /// Preference requests recorded so far.
    #[must_use]
    pub fn requests(&self) -> Vec<PreferenceRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn create_preference(
        &self,
        request: PreferenceRequest,
    ) -> Result<Preference, PaymentError> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request);
        Ok(Preference {
            id: PreferenceId::new("pref-test"),
            redirect_url: "https://pay.test/pref-test".to_owned(),
        })
    }

    async fn fetch_payment(&self, id: &PaymentId) -> Result<Payment, PaymentError> {
        self.payments
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| PaymentError::PaymentNotFound(id.clone()))
    }
}

/// Rate provider double returning a fixed quote set.
pub struct StaticRateProvider {
    quotes: Vec<RateQuote>,
}

impl StaticRateProvider {
    #[must_use]
    pub fn new(quotes: Vec<RateQuote>) -> Self {
        Self { quotes }
    }
}

#[async_trait]
impl RateProvider for StaticRateProvider {
    async fn quote(
        &self,
        _origin: &Waypoint,
        _destination: &Waypoint,
        _parcel: ParcelSpec,
    ) -> Result<Vec<RateQuote>, ShippingError> {
        Ok(self.quotes.clone())
    }
}

/// Build a successful quote.
#[must_use]
pub fn rate_quote(carrier: &str, total_price: Decimal, success: bool) -> RateQuote {
    RateQuote {
        carrier: carrier.to_owned(),
        service_level: "ground".to_owned(),
        total_price,
        estimated_days: 3,
        currency: "MXN".to_owned(),
        success,
    }
}

/// Everything a test scenario needs: the doubles and the assembled state.
pub struct TestContext {
    pub store: MemoryStore,
    pub gateway: Arc<FakePaymentGateway>,
    pub state: AppState,
    _guest_dir: tempfile::TempDir,
}

impl TestContext {
    /// Context with one successful default quote (95 MXN).
    #[must_use]
    pub fn new() -> Self {
        Self::with_quotes(vec![rate_quote("estafeta", Decimal::new(95, 0), true)])
    }

    /// Context with a caller-chosen quote set.
    ///
    /// # Panics
    ///
    /// Panics if the temporary guest-store directory cannot be created.
    #[must_use]
    pub fn with_quotes(quotes: Vec<RateQuote>) -> Self {
        let guest_dir = tempfile::tempdir().expect("tempdir");
        let store = MemoryStore::new();
        let gateway = Arc::new(FakePaymentGateway::default());
        let identity = Arc::new(StaticIdentityProvider::new([
            (TOKEN_USER_1.to_owned(), UserId::new("u1")),
            (TOKEN_USER_2.to_owned(), UserId::new("u2")),
        ]));
        let guest = GuestStore::open(guest_dir.path().join("guest.json"));

        let state = AppState::new(
            test_config(),
            Arc::new(store.clone()),
            identity,
            gateway.clone(),
            Arc::new(StaticRateProvider::new(quotes)),
            guest,
        );

        Self {
            store,
            gateway,
            state,
            _guest_dir: guest_dir,
        }
    }

    /// A fresh router over this context's state.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::routes().with_state(self.state.clone())
    }

    /// Seed a product document.
    pub fn seed_product(&self, id: &str, name: &str, price: &str, total_sales: u64) {
        self.store.seed(
            "products",
            id,
            serde_json::json!({
                "id": id,
                "name": name,
                "price": price,
                "total_sales": total_sales,
            }),
        );
    }

    /// Send a request and return the raw response, headers included.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built.
    pub async fn request_raw(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("session={token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };
        self.router().oneshot(request).await.expect("response")
    }

    /// Send a request and return `(status, parsed JSON body)`.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the response body read.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.request_raw(method, uri, token, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };
        (status, value)
    }

    /// GET helper.
    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request("GET", uri, token, None).await
    }

    /// POST helper.
    pub async fn post(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        self.request("POST", uri, token, Some(body)).await
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration used by every test context: 999 free-shipping threshold,
/// zero tax, Oaxaca origin.
fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        host: "127.0.0.1".parse().expect("ip"),
        port: 0,
        base_url: "http://localhost:3000".to_owned(),
        identity: IdentityConfig {
            base_url: "http://identity.test".to_owned(),
            api_key: SecretString::from("test-key"),
        },
        shipping: ShippingConfig {
            base_url: "http://rates.test".to_owned(),
            client_id: "client".to_owned(),
            client_secret: SecretString::from("test-secret"),
            origin: Waypoint {
                zipcode: "68000".to_owned(),
                city: "Oaxaca".to_owned(),
                state: "OAX".to_owned(),
                country: "MX".to_owned(),
            },
            free_shipping_threshold: Decimal::new(999, 0),
        },
        payments: PaymentsConfig {
            base_url: "http://pay.test".to_owned(),
            access_token: SecretString::from("test-token"),
        },
        tax_rate: Decimal::ZERO,
        guest_store_path: "unused.json".into(),
        sentry_dsn: None,
    }
}
