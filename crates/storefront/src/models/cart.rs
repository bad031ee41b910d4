//! Cart and favorites models.
//!
//! Cart lines carry no price: a cart's total is always derived from the
//! current catalog price at read time. Prices are frozen only into orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use verbena_core::ProductId;

/// Canonical key of a cart line: product id plus optional variant.
///
/// Both the guest and the authenticated cart key lines the same way. A
/// guest "size" becomes the variant here, so merging at login never
/// collapses two sizes of the same product into one line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartKey {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl CartKey {
    /// Key with no variant.
    #[must_use]
    pub fn product(product_id: impl Into<ProductId>) -> Self {
        Self {
            product_id: product_id.into(),
            variant: None,
        }
    }

    /// Key with a variant (e.g., a size).
    #[must_use]
    pub fn with_variant(product_id: impl Into<ProductId>, variant: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            variant: Some(variant.into()),
        }
    }

    /// Stable document-id fragment for this key.
    #[must_use]
    pub fn doc_fragment(&self) -> String {
        match &self.variant {
            Some(variant) => format!("{}#{variant}", self.product_id),
            None => self.product_id.to_string(),
        }
    }
}

/// One line of a cart, unique by [`CartKey`] within a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    /// The canonical key of this line.
    #[must_use]
    pub fn key(&self) -> CartKey {
        CartKey {
            product_id: self.product_id.clone(),
            variant: self.variant.clone(),
        }
    }
}

/// A favorite product. Same dual-storage duality as cart items, no quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteItem {
    pub product_id: ProductId,
    pub added_at: DateTime<Utc>,
}

/// A guest cart entry as uploaded at login.
///
/// The product id is optional on purpose: malformed persisted entries are
/// skipped during sync rather than aborting the whole merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuestCartItem {
    #[serde(default)]
    pub product_id: Option<String>,
    /// Guest-side variant selector (historically called "size").
    #[serde(default, alias = "size")]
    pub variant: Option<String>,
    #[serde(default)]
    pub quantity: u32,
}

impl GuestCartItem {
    /// The canonical key, if the entry is well-formed.
    #[must_use]
    pub fn key(&self) -> Option<CartKey> {
        let product_id = self.product_id.as_deref().filter(|id| !id.is_empty())?;
        Some(CartKey {
            product_id: ProductId::new(product_id),
            variant: self.variant.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_fragment_with_and_without_variant() {
        assert_eq!(CartKey::product("sku-1").doc_fragment(), "sku-1");
        assert_eq!(
            CartKey::with_variant("sku-1", "M").doc_fragment(),
            "sku-1#M"
        );
    }

    #[test]
    fn test_guest_item_without_product_id_has_no_key() {
        let missing = GuestCartItem {
            product_id: None,
            variant: None,
            quantity: 2,
        };
        assert!(missing.key().is_none());

        let empty = GuestCartItem {
            product_id: Some(String::new()),
            variant: None,
            quantity: 2,
        };
        assert!(empty.key().is_none());
    }

    #[test]
    fn test_guest_item_size_alias() {
        let item: GuestCartItem =
            serde_json::from_str(r#"{"product_id": "sku-1", "size": "L", "quantity": 1}"#)
                .expect("deserialize");
        assert_eq!(item.variant.as_deref(), Some("L"));
    }
}
