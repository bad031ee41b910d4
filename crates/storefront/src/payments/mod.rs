//! Payment collaborator.
//!
//! The payment provider hosts the actual charge: the storefront creates a
//! redirectable "preference" for a priced cart and is later notified of
//! payment events over a webhook. Notifications are at-least-once and
//! unauthenticated by transport, so the engine never trusts amounts or
//! status embedded in the notification body - it re-fetches the payment
//! from the provider by id.

mod client;

pub use client::HttpPaymentGateway;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use verbena_core::{AddressId, PaymentId, PreferenceId, UserId};

use crate::models::cart::CartKey;

/// Errors from the payment collaborator.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The HTTP call failed.
    #[error("payment provider request failed: {0}")]
    Request(String),

    /// The provider responded with an unusable payload or status.
    #[error("payment provider error: {0}")]
    Api(String),

    /// The referenced payment does not exist at the provider.
    #[error("payment not found: {0}")]
    PaymentNotFound(PaymentId),
}

/// One line of a preference, as shown on the hosted payment page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceLineItem {
    pub title: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub currency: String,
}

/// A cart line frozen into payment metadata at preference-creation time.
///
/// Order finalization reads this snapshot, never the live cart: whatever
/// the buyer did to their cart after redirecting to the payment page must
/// not change what they are charged for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenLine {
    #[serde(flatten)]
    pub key: CartKey,
    pub quantity: u32,
}

/// Metadata attached to a preference and echoed back on the payment.
///
/// Shipping cost and tax are frozen here alongside the lines: the order is
/// finalized with the amounts the buyer saw, not amounts re-derived later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub owner_id: UserId,
    pub address_id: AddressId,
    pub lines: Vec<FrozenLine>,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
}

/// Request to create a payment preference.
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceRequest {
    pub line_items: Vec<PreferenceLineItem>,
    pub metadata: PaymentMetadata,
    pub back_urls: BackUrls,
}

/// Redirect targets after the hosted payment page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

/// A created preference, redirectable to the hosted payment page.
#[derive(Debug, Clone, Deserialize)]
pub struct Preference {
    pub id: PreferenceId,
    pub redirect_url: String,
}

/// Payment status as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Approved,
    Pending,
    InProcess,
    Rejected,
    Cancelled,
    Refunded,
}

/// A payment fetched from the provider - the source of truth a webhook
/// notification points at.
#[derive(Debug, Clone, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub status: PaymentStatus,
    pub metadata: PaymentMetadata,
    #[serde(default)]
    pub payment_method: Option<String>,
}

/// Inbound webhook notification payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookNotification {
    #[serde(rename = "type")]
    pub kind: String,
    pub action: String,
    pub data: WebhookData,
}

/// The `data` object of a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookData {
    pub id: PaymentId,
}

impl WebhookNotification {
    /// Whether this notification announces a created payment - the only
    /// kind the engine acts on.
    #[must_use]
    pub fn is_payment_created(&self) -> bool {
        self.kind == "payment" && self.action == "payment.created"
    }
}

/// Contract for the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a redirectable payment preference for a priced cart.
    async fn create_preference(
        &self,
        request: PreferenceRequest,
    ) -> Result<Preference, PaymentError>;

    /// Fetch a payment by id from the provider.
    async fn fetch_payment(&self, id: &PaymentId) -> Result<Payment, PaymentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_kind_filter() {
        let created: WebhookNotification = serde_json::from_str(
            r#"{"type": "payment", "action": "payment.created", "data": {"id": "pay-1"}}"#,
        )
        .expect("deserialize");
        assert!(created.is_payment_created());

        let updated: WebhookNotification = serde_json::from_str(
            r#"{"type": "payment", "action": "payment.updated", "data": {"id": "pay-1"}}"#,
        )
        .expect("deserialize");
        assert!(!updated.is_payment_created());

        let other: WebhookNotification = serde_json::from_str(
            r#"{"type": "plan", "action": "payment.created", "data": {"id": "pay-1"}}"#,
        )
        .expect("deserialize");
        assert!(!other.is_payment_created());
    }

    #[test]
    fn test_metadata_round_trip() {
        let metadata = PaymentMetadata {
            owner_id: UserId::new("usr-1"),
            address_id: AddressId::new("addr-1"),
            lines: vec![FrozenLine {
                key: CartKey::with_variant("sku-1", "M"),
                quantity: 2,
            }],
            shipping_cost: Decimal::new(9900, 2),
            tax: Decimal::ZERO,
        };
        let json = serde_json::to_value(&metadata).expect("serialize");
        let back: PaymentMetadata = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, metadata);
    }
}
