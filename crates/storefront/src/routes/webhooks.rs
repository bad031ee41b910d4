//! Payment webhook intake.
//!
//! The provider delivers at least once and retries on any non-2xx
//! response. Handled and deliberately-ignored notifications both return
//! 200; every real failure propagates as an error status so the provider
//! redelivers.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use verbena_core::OrderId;

use crate::error::Result;
use crate::payments::WebhookNotification;
use crate::services::WebhookOutcome;
use crate::state::AppState;

#[derive(Serialize)]
pub struct WebhookResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
}

/// POST /webhooks/payments
#[instrument(skip_all)]
pub async fn payments(
    State(state): State<AppState>,
    Json(notification): Json<WebhookNotification>,
) -> Result<Json<WebhookResponse>> {
    let outcome = state.orders().handle_notification(&notification).await?;
    let response = match outcome {
        WebhookOutcome::Ignored => WebhookResponse {
            outcome: "ignored",
            order_id: None,
        },
        WebhookOutcome::AlreadyProcessed(order_id) => WebhookResponse {
            outcome: "already_processed",
            order_id: Some(order_id),
        },
        WebhookOutcome::PaymentNotApproved => WebhookResponse {
            outcome: "payment_not_approved",
            order_id: None,
        },
        WebhookOutcome::Finalized(order_id) => WebhookResponse {
            outcome: "finalized",
            order_id: Some(order_id),
        },
    };
    Ok(Json(response))
}
