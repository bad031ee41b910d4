//! Cart route handlers.
//!
//! Every mutation routes to the store matching the caller's authentication
//! state: the server cart for a signed-in user, the local guest store
//! otherwise. The sync endpoint validates the uploaded payload's shape
//! before any write so a malformed snapshot cannot half-merge.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{CartItem, CartKey, GuestCartItem};
use crate::services::SyncSummary;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LineRequest {
    pub product_id: String,
    #[serde(default, alias = "size")]
    pub variant: Option<String>,
    #[serde(default = "default_delta")]
    pub quantity: i64,
}

const fn default_delta() -> i64 {
    1
}

impl LineRequest {
    fn key(&self) -> Result<CartKey> {
        if self.product_id.is_empty() {
            return Err(AppError::InvalidArgument(
                "product_id must not be empty".to_owned(),
            ));
        }
        Ok(CartKey {
            product_id: self.product_id.as_str().into(),
            variant: self.variant.clone(),
        })
    }
}

/// GET /cart
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
) -> Result<Json<Vec<CartItem>>> {
    let items = match identity {
        Some(identity) => state.cart().read_cart(&identity.subject_id).await?,
        None => state.guest().read_cart(),
    };
    Ok(Json(items))
}

/// POST /cart/add
#[instrument(skip_all)]
pub async fn add(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
    Json(request): Json<LineRequest>,
) -> Result<Json<Option<CartItem>>> {
    let key = request.key()?;
    let item = match identity {
        Some(identity) => {
            state
                .cart()
                .add_item(&identity.subject_id, &key, request.quantity)
                .await?
        }
        None => state.guest().adjust_cart(&key, request.quantity),
    };
    Ok(Json(item))
}

/// POST /cart/remove
#[instrument(skip_all)]
pub async fn remove(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
    Json(request): Json<LineRequest>,
) -> Result<Json<Vec<CartItem>>> {
    let key = request.key()?;
    match identity {
        Some(identity) => {
            state.cart().remove_item(&identity.subject_id, &key).await?;
            Ok(Json(state.cart().read_cart(&identity.subject_id).await?))
        }
        None => {
            state.guest().remove_from_cart(&key);
            Ok(Json(state.guest().read_cart()))
        }
    }
}

/// POST /cart/sync
///
/// Accepts the raw uploaded snapshot as JSON and validates its shape
/// before touching the store: `items` must be an array of objects,
/// `favorites` (optional) an array of strings. Entries inside a
/// well-shaped array that lack a product id are skipped by the merge,
/// not rejected.
#[instrument(skip_all, fields(user = %identity.subject_id))]
pub async fn sync(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(body): Json<Value>,
) -> Result<Json<SyncSummary>> {
    let items = parse_items(&body)?;
    let favorites = parse_favorites(&body)?;

    let summary = state
        .cart()
        .sync_guest_cart(&identity.subject_id, &items, &favorites)
        .await?;
    Ok(Json(summary))
}

fn parse_items(body: &Value) -> Result<Vec<GuestCartItem>> {
    let items = body
        .get("items")
        .ok_or_else(|| AppError::InvalidArgument("missing items".to_owned()))?;
    let array = items
        .as_array()
        .ok_or_else(|| AppError::InvalidArgument("items must be an array".to_owned()))?;

    array
        .iter()
        .map(|entry| {
            if !entry.is_object() {
                return Err(AppError::InvalidArgument(
                    "items entries must be objects".to_owned(),
                ));
            }
            serde_json::from_value(entry.clone())
                .map_err(|e| AppError::InvalidArgument(format!("malformed cart entry: {e}")))
        })
        .collect()
}

fn parse_favorites(body: &Value) -> Result<Vec<verbena_core::ProductId>> {
    let Some(favorites) = body.get("favorites") else {
        return Ok(Vec::new());
    };
    let array = favorites
        .as_array()
        .ok_or_else(|| AppError::InvalidArgument("favorites must be an array".to_owned()))?;

    array
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .map(Into::into)
                .ok_or_else(|| {
                    AppError::InvalidArgument("favorites entries must be strings".to_owned())
                })
        })
        .collect()
}
