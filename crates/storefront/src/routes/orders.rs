//! Order route handlers. All require authentication.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use verbena_core::OrderId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::state::AppState;

/// GET /orders
#[instrument(skip_all, fields(user = %identity.subject_id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list_for_user(&identity.subject_id).await?))
}

/// GET /orders/{id}
#[instrument(skip_all, fields(user = %identity.subject_id, order = %id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().get(&identity.subject_id, &id).await?))
}
