//! Favorites route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use verbena_core::ProductId;

use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::models::FavoriteItem;
use crate::state::AppState;

/// GET /favorites
#[instrument(skip_all)]
pub async fn list(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
) -> Result<Json<Vec<FavoriteItem>>> {
    let favorites = match identity {
        Some(identity) => state.cart().read_favorites(&identity.subject_id).await?,
        None => state.guest().read_favorites(),
    };
    Ok(Json(favorites))
}

/// POST /favorites/{product_id}
#[instrument(skip_all, fields(product_id = %product_id))]
pub async fn add(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Vec<FavoriteItem>>> {
    match identity {
        Some(identity) => {
            state
                .cart()
                .add_favorite(&identity.subject_id, &product_id)
                .await?;
            Ok(Json(state.cart().read_favorites(&identity.subject_id).await?))
        }
        None => {
            state.guest().add_favorite(&product_id);
            Ok(Json(state.guest().read_favorites()))
        }
    }
}

/// DELETE /favorites/{product_id}
#[instrument(skip_all, fields(product_id = %product_id))]
pub async fn remove(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Vec<FavoriteItem>>> {
    match identity {
        Some(identity) => {
            state
                .cart()
                .remove_favorite(&identity.subject_id, &product_id)
                .await?;
            Ok(Json(state.cart().read_favorites(&identity.subject_id).await?))
        }
        None => {
            state.guest().remove_favorite(&product_id);
            Ok(Json(state.guest().read_favorites()))
        }
    }
}
