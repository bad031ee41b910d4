//! Checkout route handlers. All require authentication.
//!
//! Both endpoints quote shipping fresh: quotes are ephemeral and never
//! persisted, so a preview and the preference that follows it each hit
//! the rate provider.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use verbena_core::{AddressId, PreferenceId, UserId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::CartItem;
use crate::services::Totals;
use crate::shipping::{RateQuote, Waypoint, default_parcel, select_default_quote};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub address_id: AddressId,
}

#[derive(Serialize)]
pub struct QuoteResponse {
    pub quotes: Vec<RateQuote>,
    pub selected: RateQuote,
    pub totals: Totals,
}

#[derive(Serialize)]
pub struct PreferenceResponse {
    pub preference_id: PreferenceId,
    pub redirect_url: String,
    pub totals: Totals,
}

/// Load the caller's cart and quote shipping to the given address,
/// returning the cart, all quotes, and the selected default.
async fn quoted_checkout(
    state: &AppState,
    owner: &UserId,
    address_id: &AddressId,
) -> Result<(Vec<CartItem>, Vec<RateQuote>, RateQuote)> {
    let cart = state.cart().read_cart(owner).await?;
    if cart.is_empty() {
        return Err(AppError::InvalidArgument(
            "cannot check out an empty cart".to_owned(),
        ));
    }

    let stored = state.addresses().get(owner, address_id).await?;
    let destination = Waypoint::from(&stored.address);
    let quotes = state
        .shipping()
        .quote(&state.config().shipping.origin, &destination, default_parcel())
        .await?;
    let selected = select_default_quote(&quotes)?.clone();
    Ok((cart, quotes, selected))
}

/// POST /checkout/quote
#[instrument(skip_all, fields(user = %identity.subject_id))]
pub async fn quote(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<QuoteResponse>> {
    let owner = identity.subject_id;
    let (cart, quotes, selected) = quoted_checkout(&state, &owner, &request.address_id).await?;

    // Preview with the same numbers preference creation will freeze.
    let provisional = state
        .checkout()
        .compute_totals(&cart, rust_decimal::Decimal::ZERO, rust_decimal::Decimal::ZERO)
        .await?;
    let shipping_cost = state
        .checkout()
        .shipping_cost_for(provisional.subtotal, &selected);
    let tax = state.checkout().tax_for(provisional.subtotal);
    let totals = state.checkout().compute_totals(&cart, shipping_cost, tax).await?;

    Ok(Json(QuoteResponse {
        quotes,
        selected,
        totals,
    }))
}

/// POST /checkout/preference
#[instrument(skip_all, fields(user = %identity.subject_id))]
pub async fn preference(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<PreferenceResponse>> {
    let owner = identity.subject_id;
    let (cart, _quotes, selected) = quoted_checkout(&state, &owner, &request.address_id).await?;

    let (preference, totals) = state
        .checkout()
        .begin_checkout(&owner, &request.address_id, &cart, &selected)
        .await?;

    Ok(Json(PreferenceResponse {
        preference_id: preference.id,
        redirect_url: preference.redirect_url,
        totals,
    }))
}
