//! Shipping address book.
//!
//! The one invariant here is "at most one default address per user". The
//! store commits batches atomically but gives no isolation across calls,
//! so every operation that toggles `is_default` runs under the per-user
//! lock: read the book, build one batch that clears the old default and
//! sets the new one, commit.

use std::sync::Arc;

use serde_json::{Map, json};
use tracing::instrument;
use uuid::Uuid;

use verbena_core::{AddressId, UserId};

use crate::error::{AppError, Result};
use crate::models::ShippingAddress;
use crate::store::{DocumentStore, WriteBatch, collections, server_timestamp};

use super::UserLocks;

/// An address as stored, paired with its id.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StoredAddress {
    pub id: AddressId,
    #[serde(flatten)]
    pub address: ShippingAddress,
}

/// Address book operations.
#[derive(Clone)]
pub struct AddressService {
    store: Arc<dyn DocumentStore>,
    locks: UserLocks,
}

impl AddressService {
    /// Create an address service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, locks: UserLocks) -> Self {
        Self { store, locks }
    }

    /// List the user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the query fails.
    pub async fn list(&self, owner: &UserId) -> Result<Vec<StoredAddress>> {
        let docs = self
            .store
            .query(collections::ADDRESSES, "owner_id", &json!(owner.as_str()))
            .await?;
        let mut addresses = Vec::with_capacity(docs.len());
        for doc in docs {
            addresses.push(StoredAddress {
                id: AddressId::from(doc.id.as_str()),
                address: doc.parse::<ShippingAddress>()?,
            });
        }
        Ok(addresses)
    }

    /// Fetch one of the user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the address does not exist or
    /// belongs to a different user - ownership mismatches are
    /// indistinguishable from absence to the caller.
    pub async fn get(&self, owner: &UserId, id: &AddressId) -> Result<StoredAddress> {
        let data = self
            .store
            .get(collections::ADDRESSES, id.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("address {id}")))?;
        let address: ShippingAddress =
            serde_json::from_value(data).map_err(crate::store::StoreError::from)?;
        if address.owner_id != *owner {
            return Err(AppError::NotFound(format!("address {id}")));
        }
        Ok(StoredAddress {
            id: id.clone(),
            address,
        })
    }

    /// Create an address.
    ///
    /// A new address marked default demotes the previous default in the
    /// same batch.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArgument` if the address is owned by a
    /// different user than the caller, `AppError::Store` on write failure.
    #[instrument(skip(self, address), fields(owner = %owner))]
    pub async fn create(&self, owner: &UserId, address: ShippingAddress) -> Result<AddressId> {
        if address.owner_id != *owner {
            return Err(AppError::InvalidArgument(
                "address owner does not match caller".to_owned(),
            ));
        }
        let _guard = self.locks.lock(owner).await;

        let id = AddressId::new(format!("adr_{}", Uuid::new_v4().simple()));
        let mut batch = WriteBatch::new();

        if address.is_default {
            self.demote_defaults(owner, &mut batch).await?;
        }

        let mut data =
            serde_json::to_value(&address).map_err(crate::store::StoreError::from)?;
        if let Some(object) = data.as_object_mut() {
            object.insert("created_at".to_owned(), server_timestamp());
        }
        batch.create(collections::ADDRESSES, id.as_str(), data);
        self.store.commit(batch).await?;
        Ok(id)
    }

    /// Mark one address as the user's default, demoting any other.
    ///
    /// Concurrent calls for the same user serialize on the per-user lock,
    /// so two racing requests settle on exactly one default - the later
    /// one wins.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the address does not exist for this
    /// user, `AppError::Store` on write failure.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn set_default(&self, owner: &UserId, id: &AddressId) -> Result<()> {
        let _guard = self.locks.lock(owner).await;

        // Existence and ownership check before touching anything.
        self.get_unlocked(owner, id).await?;

        let mut batch = WriteBatch::new();
        self.demote_defaults(owner, &mut batch).await?;
        batch.update(
            collections::ADDRESSES,
            id.as_str(),
            default_fields(true),
        );
        self.store.commit(batch).await?;
        Ok(())
    }

    /// Delete one of the user's addresses. Deleting the default leaves the
    /// user with no default.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the address does not exist for this
    /// user, `AppError::Store` on write failure.
    pub async fn delete(&self, owner: &UserId, id: &AddressId) -> Result<()> {
        let _guard = self.locks.lock(owner).await;
        self.get_unlocked(owner, id).await?;

        let mut batch = WriteBatch::new();
        batch.delete(collections::ADDRESSES, id.as_str());
        self.store.commit(batch).await?;
        Ok(())
    }

    /// Queue demotion updates for every currently-default address.
    async fn demote_defaults(&self, owner: &UserId, batch: &mut WriteBatch) -> Result<()> {
        for stored in self.list(owner).await? {
            if stored.address.is_default {
                batch.update(
                    collections::ADDRESSES,
                    stored.id.as_str(),
                    default_fields(false),
                );
            }
        }
        Ok(())
    }

    // get() without taking the lock; called while already holding it.
    async fn get_unlocked(&self, owner: &UserId, id: &AddressId) -> Result<StoredAddress> {
        let data = self
            .store
            .get(collections::ADDRESSES, id.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("address {id}")))?;
        let address: ShippingAddress =
            serde_json::from_value(data).map_err(crate::store::StoreError::from)?;
        if address.owner_id != *owner {
            return Err(AppError::NotFound(format!("address {id}")));
        }
        Ok(StoredAddress {
            id: id.clone(),
            address,
        })
    }
}

fn default_fields(is_default: bool) -> Map<String, serde_json::Value> {
    let mut fields = Map::new();
    fields.insert("is_default".to_owned(), json!(is_default));
    fields
}
