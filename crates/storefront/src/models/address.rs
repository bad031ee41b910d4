//! Shipping address model.

use serde::{Deserialize, Serialize};

use verbena_core::UserId;

/// A shipping address owned by a user.
///
/// At most one address per user has `is_default = true`; that invariant is
/// enforced by `AddressService::set_default`, which serializes per user.
/// Orders embed a copy of the chosen address, never a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub owner_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interior_number: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub between_streets: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}
