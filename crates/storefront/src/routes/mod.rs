//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                  - Liveness check
//! GET    /health/ready            - Readiness check
//!
//! # Auth
//! POST   /auth/login              - Exchange credential, set session cookie
//! POST   /auth/renew              - Extend the session cookie
//! POST   /auth/logout             - Clear the session cookie
//!
//! # Cart
//! GET    /cart                    - Read cart (guest or authenticated)
//! POST   /cart/add                - Apply a quantity delta to a line
//! POST   /cart/remove             - Remove a line
//! POST   /cart/sync               - Merge an uploaded guest snapshot (auth)
//!
//! # Favorites
//! GET    /favorites               - List favorites
//! POST   /favorites/{product_id}  - Add a favorite
//! DELETE /favorites/{product_id}  - Remove a favorite
//!
//! # Addresses (auth)
//! GET    /addresses               - List addresses
//! POST   /addresses               - Create an address
//! DELETE /addresses/{id}          - Delete an address
//! POST   /addresses/{id}/default  - Mark as default
//!
//! # Checkout (auth)
//! POST   /checkout/quote          - Fetch shipping quotes and a price preview
//! POST   /checkout/preference     - Create the payment preference
//!
//! # Orders (auth)
//! GET    /orders                  - List the caller's orders
//! GET    /orders/{id}             - Fetch one order
//!
//! # Webhooks
//! POST   /webhooks/payments       - Payment notification intake
//! ```

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod favorites;
pub mod orders;
pub mod webhooks;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/renew", post(auth::renew))
        .route("/logout", post(auth::logout))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/remove", post(cart::remove))
        .route("/sync", post(cart::sync))
}

/// Create the favorites routes router.
pub fn favorite_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(favorites::list))
        .route(
            "/{product_id}",
            post(favorites::add).delete(favorites::remove),
        )
}

/// Create the address routes router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::list).post(addresses::create))
        .route("/{id}", delete(addresses::remove))
        .route("/{id}/default", post(addresses::set_default))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/quote", post(checkout::quote))
        .route("/preference", post(checkout::preference))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list))
        .route("/{id}", get(orders::show))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .nest("/auth", auth_routes())
        .nest("/cart", cart_routes())
        .nest("/favorites", favorite_routes())
        .nest("/addresses", address_routes())
        .nest("/checkout", checkout_routes())
        .nest("/orders", order_routes())
        .route("/webhooks/payments", post(webhooks::payments))
}

/// Liveness check.
async fn health() -> &'static str {
    "OK"
}

/// Readiness check.
async fn ready() -> &'static str {
    "READY"
}
