//! The cart reconciliation engine.
//!
//! Owns the rules for merging guest and authenticated cart state, pricing a
//! checkout, and driving order creation from a payment notification. Every
//! service holds injected collaborator handles; none reach for ambient
//! global state.

pub mod addresses;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;

pub use addresses::AddressService;
pub use cart::{CartService, SyncSummary};
pub use catalog::CatalogService;
pub use checkout::{CheckoutService, Totals};
pub use orders::{OrderService, WebhookOutcome};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

use verbena_core::UserId;

/// Per-user serialization for read-then-batch-write sequences.
///
/// The document store gives atomicity of a write set but no isolation;
/// operations that must not interleave for one user (default-address
/// toggling) take this lock around their read-then-write.
#[derive(Default, Clone)]
pub struct UserLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl UserLocks {
    /// Create an empty lock map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one user, creating it on first use.
    pub async fn lock(&self, user: &UserId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut guard = self
                .inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(
                guard
                    .entry(user.as_str().to_owned())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_locks_are_per_user() {
        let locks = UserLocks::new();
        let a = locks.lock(&UserId::new("u1")).await;
        // A different user's lock is acquirable while u1 is held.
        let _b = locks.lock(&UserId::new("u2")).await;
        drop(a);
        let _a2 = locks.lock(&UserId::new("u1")).await;
    }
}
