//! Shipping-rate collaborator.
//!
//! Given origin, destination, and parcel, the rate provider returns a set
//! of carrier quotes; the storefront keeps the successful ones and defaults
//! to the cheapest. Quotes are ephemeral - fetched per checkout session and
//! never persisted.

mod auth;
mod client;

pub use auth::{RateApiToken, authenticate};
pub use client::{ShippingClient, Waypoint};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the shipping-rate collaborator.
#[derive(Debug, Error)]
pub enum ShippingError {
    /// Credentials were rejected by the rate provider.
    #[error("rate provider authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The HTTP call failed.
    #[error("rate provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider responded but with an unusable payload or status.
    #[error("rate provider error: {0}")]
    Api(String),

    /// No successful quote remained after filtering.
    #[error("no shipping quotes available")]
    NoQuotesAvailable,
}

/// A single carrier quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub carrier: String,
    pub service_level: String,
    pub total_price: Decimal,
    pub estimated_days: u32,
    pub currency: String,
    #[serde(default)]
    pub success: bool,
}

/// Parcel specification sent to the rate provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParcelSpec {
    pub weight_kg: Decimal,
    pub length_cm: u32,
    pub width_cm: u32,
    pub height_cm: u32,
}

/// The one parcel profile quoted for every checkout, regardless of cart
/// contents. Known simplification carried over from the original flow;
/// changing it means re-tuning the negotiated carrier rates.
#[must_use]
pub const fn default_parcel() -> ParcelSpec {
    ParcelSpec {
        weight_kg: Decimal::ONE,
        length_cm: 30,
        width_cm: 30,
        height_cm: 15,
    }
}

/// Contract for the shipping-rate collaborator.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetch carrier quotes for one parcel between two waypoints.
    async fn quote(
        &self,
        origin: &Waypoint,
        destination: &Waypoint,
        parcel: ParcelSpec,
    ) -> Result<Vec<RateQuote>, ShippingError>;
}

/// Pick the default quote: cheapest among successful ones, ties broken by
/// first-seen order.
///
/// # Errors
///
/// Returns `ShippingError::NoQuotesAvailable` when no successful quote
/// remains after filtering.
pub fn select_default_quote(quotes: &[RateQuote]) -> Result<&RateQuote, ShippingError> {
    quotes
        .iter()
        .filter(|quote| quote.success)
        // min_by_key is stable: the first of equal-priced quotes wins.
        .min_by_key(|quote| quote.total_price)
        .ok_or(ShippingError::NoQuotesAvailable)
}
