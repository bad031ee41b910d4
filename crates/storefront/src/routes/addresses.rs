//! Address book route handlers. All require authentication.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use verbena_core::AddressId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::ShippingAddress;
use crate::services::addresses::StoredAddress;
use crate::state::AppState;

/// Address creation payload. The owner is always the caller; it is never
/// accepted from the body.
#[derive(Deserialize)]
pub struct CreateAddressRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    #[serde(default)]
    pub interior_number: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
    pub reference: String,
    #[serde(default)]
    pub between_streets: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl CreateAddressRequest {
    fn into_address(self, owner_id: verbena_core::UserId) -> ShippingAddress {
        ShippingAddress {
            owner_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            street: self.street,
            interior_number: self.interior_number,
            neighborhood: self.neighborhood,
            city: self.city,
            state: self.state,
            zipcode: self.zipcode,
            country: self.country,
            reference: self.reference,
            between_streets: self.between_streets,
            is_default: self.is_default,
        }
    }
}

/// GET /addresses
#[instrument(skip_all, fields(user = %identity.subject_id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Vec<StoredAddress>>> {
    Ok(Json(state.addresses().list(&identity.subject_id).await?))
}

/// POST /addresses
#[instrument(skip_all, fields(user = %identity.subject_id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(request): Json<CreateAddressRequest>,
) -> Result<(StatusCode, Json<StoredAddress>)> {
    let owner = identity.subject_id;
    let address = request.into_address(owner.clone());
    let id = state.addresses().create(&owner, address).await?;
    let stored = state.addresses().get(&owner, &id).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// DELETE /addresses/{id}
#[instrument(skip_all, fields(user = %identity.subject_id, address = %id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    state.addresses().delete(&identity.subject_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /addresses/{id}/default
#[instrument(skip_all, fields(user = %identity.subject_id, address = %id))]
pub async fn set_default(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<Json<Vec<StoredAddress>>> {
    let owner = identity.subject_id;
    state.addresses().set_default(&owner, &id).await?;
    Ok(Json(state.addresses().list(&owner).await?))
}
