//! Authenticated cart and favorites operations.
//!
//! Two write paths with deliberately different semantics:
//!
//! - the bulk login sync **overwrites** quantities with the guest snapshot,
//!   making it idempotent - replaying the same snapshot cannot inflate the
//!   cart;
//! - the incremental add **accumulates**, because each call represents a
//!   distinct user action.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, instrument};

use verbena_core::{ProductId, UserId};

use crate::error::{AppError, Result};
use crate::models::cart::{CartItem, CartKey, FavoriteItem, GuestCartItem};
use crate::store::{DocumentStore, WriteBatch, collections, server_timestamp};

/// Cart line document id: `owner:product` or `owner:product#variant`.
pub(crate) fn cart_doc_id(owner: &UserId, key: &CartKey) -> String {
    format!("{owner}:{}", key.doc_fragment())
}

/// Favorite document id: `owner:product`.
fn favorite_doc_id(owner: &UserId, product_id: &ProductId) -> String {
    format!("{owner}:{product_id}")
}

/// Result of a bulk guest sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct SyncSummary {
    /// Guest cart lines written into the server cart.
    pub merged: usize,
    /// Malformed guest entries skipped.
    pub skipped: usize,
    /// Favorites newly added.
    pub favorites_added: usize,
}

/// Cart and favorites operations against the document store.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn DocumentStore>,
}

impl CartService {
    /// Create a cart service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Read the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the query fails.
    pub async fn read_cart(&self, owner: &UserId) -> Result<Vec<CartItem>> {
        let docs = self
            .store
            .query(collections::CART_ITEMS, "owner_id", &json!(owner.as_str()))
            .await?;
        let mut items = Vec::with_capacity(docs.len());
        for doc in docs {
            items.push(doc.parse::<CartItem>()?);
        }
        Ok(items)
    }

    /// Read the user's favorites.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the query fails.
    pub async fn read_favorites(&self, owner: &UserId) -> Result<Vec<FavoriteItem>> {
        let docs = self
            .store
            .query(collections::FAVORITES, "owner_id", &json!(owner.as_str()))
            .await?;
        let mut items = Vec::with_capacity(docs.len());
        for doc in docs {
            items.push(doc.parse::<FavoriteItem>()?);
        }
        Ok(items)
    }

    /// Merge a guest snapshot into the authenticated cart at login.
    ///
    /// Guest entries without a product id are skipped, not fatal. For a
    /// line the server cart already has, the guest quantity overwrites the
    /// stored one; everything commits as a single all-or-nothing batch, so
    /// a failure partway never leaves a partially-merged cart visible.
    /// Calling twice with the same snapshot yields the same final state.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the read or the batch commit fails.
    #[instrument(skip(self, guest_items, favorite_ids), fields(owner = %owner))]
    pub async fn sync_guest_cart(
        &self,
        owner: &UserId,
        guest_items: &[GuestCartItem],
        favorite_ids: &[ProductId],
    ) -> Result<SyncSummary> {
        // Read current state first: preserved added_at for existing lines,
        // and favorite idempotency, both come from this read.
        let existing_cart = self.read_cart(owner).await?;
        let existing_favorites = self.read_favorites(owner).await?;

        let mut batch = WriteBatch::new();
        let mut summary = SyncSummary::default();

        for guest_item in guest_items {
            let Some(key) = guest_item.key() else {
                summary.skipped += 1;
                continue;
            };
            let doc_id = cart_doc_id(owner, &key);
            let existing = existing_cart.iter().find(|item| item.key() == key);

            let added_at = existing.map_or_else(server_timestamp, |item| json!(item.added_at));
            batch.set(
                collections::CART_ITEMS,
                &doc_id,
                json!({
                    "owner_id": owner,
                    "product_id": key.product_id,
                    "variant": key.variant,
                    "quantity": guest_item.quantity,
                    "added_at": added_at,
                    "updated_at": server_timestamp(),
                }),
            );
            summary.merged += 1;
        }

        for product_id in favorite_ids {
            if existing_favorites
                .iter()
                .any(|fav| fav.product_id == *product_id)
            {
                continue;
            }
            batch.set(
                collections::FAVORITES,
                &favorite_doc_id(owner, product_id),
                json!({
                    "owner_id": owner,
                    "product_id": product_id,
                    "added_at": server_timestamp(),
                }),
            );
            summary.favorites_added += 1;
        }

        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }
        debug!(?summary, "guest cart synced");
        Ok(summary)
    }

    /// Apply a quantity delta to one cart line.
    ///
    /// Accumulates onto an existing line. A resulting quantity of zero or
    /// less deletes the line; a delta that cannot create a positive line
    /// is a no-op. Returns the line as stored afterwards, `None` when the
    /// line is absent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the read or write fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn add_item(
        &self,
        owner: &UserId,
        key: &CartKey,
        delta_qty: i64,
    ) -> Result<Option<CartItem>> {
        let doc_id = cart_doc_id(owner, key);
        let existing = self
            .store
            .get(collections::CART_ITEMS, &doc_id)
            .await?
            .map(serde_json::from_value::<CartItem>)
            .transpose()
            .map_err(crate::store::StoreError::from)?;

        let current = existing.as_ref().map_or(0, |item| i64::from(item.quantity));
        let new_quantity = current + delta_qty;

        if new_quantity <= 0 {
            if existing.is_some() {
                let mut batch = WriteBatch::new();
                batch.delete(collections::CART_ITEMS, &doc_id);
                self.store.commit(batch).await?;
            }
            // Absent line and non-positive delta: nothing created.
            return Ok(None);
        }

        let quantity = u32::try_from(new_quantity)
            .map_err(|_| AppError::InvalidArgument("quantity out of range".to_owned()))?;

        let added_at = existing
            .as_ref()
            .map_or_else(server_timestamp, |item| json!(item.added_at));
        let mut batch = WriteBatch::new();
        batch.set(
            collections::CART_ITEMS,
            &doc_id,
            json!({
                "owner_id": owner,
                "product_id": key.product_id,
                "variant": key.variant,
                "quantity": quantity,
                "added_at": added_at,
                "updated_at": server_timestamp(),
            }),
        );
        self.store.commit(batch).await?;

        let stored = self
            .store
            .get(collections::CART_ITEMS, &doc_id)
            .await?
            .map(serde_json::from_value::<CartItem>)
            .transpose()
            .map_err(crate::store::StoreError::from)?;
        Ok(stored)
    }

    /// Delete one cart line. No-op if absent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the write fails.
    pub async fn remove_item(&self, owner: &UserId, key: &CartKey) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(collections::CART_ITEMS, &cart_doc_id(owner, key));
        self.store.commit(batch).await?;
        Ok(())
    }

    /// Add a favorite. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the write fails.
    pub async fn add_favorite(&self, owner: &UserId, product_id: &ProductId) -> Result<()> {
        let doc_id = favorite_doc_id(owner, product_id);
        if self.store.get(collections::FAVORITES, &doc_id).await?.is_some() {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        batch.set(
            collections::FAVORITES,
            &doc_id,
            json!({
                "owner_id": owner,
                "product_id": product_id,
                "added_at": server_timestamp(),
            }),
        );
        self.store.commit(batch).await?;
        Ok(())
    }

    /// Remove a favorite. No-op if absent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the write fails.
    pub async fn remove_favorite(&self, owner: &UserId, product_id: &ProductId) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(collections::FAVORITES, &favorite_doc_id(owner, product_id));
        self.store.commit(batch).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> (MemoryStore, CartService) {
        let store = MemoryStore::new();
        let service = CartService::new(Arc::new(store.clone()));
        (store, service)
    }

    fn guest(product_id: &str, quantity: u32) -> GuestCartItem {
        GuestCartItem {
            product_id: Some(product_id.to_owned()),
            variant: None,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_sync_overwrites_not_adds() {
        let (_store, service) = service();
        let owner = UserId::new("u1");

        // Server cart already holds qty 5 for sku-1.
        service
            .add_item(&owner, &CartKey::product("sku-1"), 5)
            .await
            .expect("seed");

        let snapshot = vec![guest("sku-1", 1)];
        service
            .sync_guest_cart(&owner, &snapshot, &[])
            .await
            .expect("sync");

        let cart = service.read_cart(&owner).await.expect("read");
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 1, "bulk sync overwrites, never adds");
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let (_store, service) = service();
        let owner = UserId::new("u1");
        let snapshot = vec![guest("sku-1", 2), guest("sku-2", 1)];

        service
            .sync_guest_cart(&owner, &snapshot, &[])
            .await
            .expect("first sync");
        service
            .sync_guest_cart(&owner, &snapshot, &[])
            .await
            .expect("second sync");

        let mut cart = service.read_cart(&owner).await.expect("read");
        cart.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        assert_eq!(cart.len(), 2);
        assert_eq!(cart[0].quantity, 2);
        assert_eq!(cart[1].quantity, 1);
    }

    #[tokio::test]
    async fn test_sync_skips_malformed_entries() {
        let (_store, service) = service();
        let owner = UserId::new("u1");
        let snapshot = vec![
            guest("sku-1", 2),
            GuestCartItem::default(), // no product id
            GuestCartItem {
                product_id: Some(String::new()),
                variant: None,
                quantity: 3,
            },
        ];

        let summary = service
            .sync_guest_cart(&owner, &snapshot, &[])
            .await
            .expect("sync");
        assert_eq!(summary.merged, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(service.read_cart(&owner).await.expect("read").len(), 1);
    }

    #[tokio::test]
    async fn test_sync_preserves_variants_as_distinct_lines() {
        let (_store, service) = service();
        let owner = UserId::new("u1");
        let snapshot = vec![
            GuestCartItem {
                product_id: Some("sku-1".to_owned()),
                variant: Some("M".to_owned()),
                quantity: 1,
            },
            GuestCartItem {
                product_id: Some("sku-1".to_owned()),
                variant: Some("L".to_owned()),
                quantity: 2,
            },
        ];

        service
            .sync_guest_cart(&owner, &snapshot, &[])
            .await
            .expect("sync");
        assert_eq!(service.read_cart(&owner).await.expect("read").len(), 2);
    }

    #[tokio::test]
    async fn test_add_item_accumulates() {
        let (_store, service) = service();
        let owner = UserId::new("u1");
        let key = CartKey::product("sku-1");

        service.add_item(&owner, &key, 2).await.expect("add");
        let item = service
            .add_item(&owner, &key, 3)
            .await
            .expect("add")
            .expect("line present");
        assert_eq!(item.quantity, 5);
    }

    #[tokio::test]
    async fn test_add_item_to_zero_deletes_line() {
        let (_store, service) = service();
        let owner = UserId::new("u1");
        let key = CartKey::product("sku-1");

        service.add_item(&owner, &key, 2).await.expect("add");
        let result = service.add_item(&owner, &key, -2).await.expect("remove");
        assert!(result.is_none());
        assert!(
            service.read_cart(&owner).await.expect("read").is_empty(),
            "line must be deleted, not stored at zero"
        );
    }

    #[tokio::test]
    async fn test_add_item_negative_on_absent_line_is_noop() {
        let (store, service) = service();
        let owner = UserId::new("u1");

        let result = service
            .add_item(&owner, &CartKey::product("sku-1"), -3)
            .await
            .expect("noop");
        assert!(result.is_none());
        assert_eq!(store.count(collections::CART_ITEMS), 0);
    }

    #[tokio::test]
    async fn test_favorites_sync_is_union() {
        let (_store, service) = service();
        let owner = UserId::new("u1");

        service
            .add_favorite(&owner, &ProductId::new("sku-1"))
            .await
            .expect("add");

        let summary = service
            .sync_guest_cart(
                &owner,
                &[],
                &[ProductId::new("sku-1"), ProductId::new("sku-2")],
            )
            .await
            .expect("sync");
        assert_eq!(summary.favorites_added, 1);
        assert_eq!(service.read_favorites(&owner).await.expect("read").len(), 2);
    }

    #[tokio::test]
    async fn test_sync_failure_leaves_no_partial_merge() {
        let (store, service) = service();
        let owner = UserId::new("u1");

        store.fail_next_commit();
        let err = service
            .sync_guest_cart(&owner, &[guest("sku-1", 1), guest("sku-2", 2)], &[])
            .await
            .expect_err("injected failure");
        assert!(matches!(err, AppError::Store(_)));
        assert_eq!(store.count(collections::CART_ITEMS), 0);
    }
}
