//! Session lifecycle handlers.
//!
//! Login exchanges a transient credential for a session token at the
//! identity collaborator, sets the cookie, and merges the local guest
//! snapshot into the server cart. The guest store is cleared only after
//! the merge commits.

use axum::{
    Json,
    extract::State,
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use verbena_core::UserId;

use crate::error::{AppError, Result};
use crate::middleware::session;
use crate::models::GuestCartItem;
use crate::services::SyncSummary;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub credential: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub subject_id: UserId,
    pub sync: SyncSummary,
}

/// POST /auth/login
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let token = state
        .identity()
        .issue(&request.credential, session::LOGIN_MAX_AGE)
        .await?;
    let identity = state.identity().verify(&token).await?;

    // Merge the device-local guest snapshot, then retire it. Overwrite
    // semantics in the sync make a crashed-and-retried login harmless.
    let guest_items: Vec<GuestCartItem> = state
        .guest()
        .read_cart()
        .into_iter()
        .map(|item| GuestCartItem {
            product_id: Some(item.product_id.to_string()),
            variant: item.variant,
            quantity: item.quantity,
        })
        .collect();
    let favorite_ids: Vec<_> = state
        .guest()
        .read_favorites()
        .into_iter()
        .map(|fav| fav.product_id)
        .collect();

    let sync = state
        .cart()
        .sync_guest_cart(&identity.subject_id, &guest_items, &favorite_ids)
        .await?;
    state.guest().clear();

    let cookie = session::session_cookie(&token, session::LOGIN_MAX_AGE, state.config().is_secure());
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(LoginResponse {
            subject_id: identity.subject_id,
            sync,
        }),
    ))
}

/// POST /auth/renew
#[instrument(skip_all)]
pub async fn renew(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse> {
    let token = session::session_token(&headers)
        .ok_or_else(|| AppError::Unauthenticated("missing session cookie".to_owned()))?;
    let identity = state.identity().verify(&token).await?;

    let cookie = session::session_cookie(&token, session::RENEW_MAX_AGE, state.config().is_secure());
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(LoginResponse {
            subject_id: identity.subject_id,
            sync: SyncSummary::default(),
        }),
    ))
}

/// POST /auth/logout
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let cookie = session::clear_session_cookie(state.config().is_secure());
    AppendHeaders([(SET_COOKIE, cookie)])
}
