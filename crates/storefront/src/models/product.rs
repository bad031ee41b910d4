//! Catalog product view.
//!
//! The storefront reads products for pricing and order snapshots; catalog
//! management lives elsewhere. `total_sales` is the one field this service
//! writes, and it only ever increases, as a side effect of order
//! finalization.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use verbena_core::ProductId;

/// A product as stored in the catalog collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub total_sales: u64,
}
