//! Local guest cart/favorites store.
//!
//! Represents an unauthenticated visitor's state with no network
//! dependency: a JSON file on the local device, one per guest session.
//! Reads never fail - a missing, unreadable, or corrupt file is treated as
//! an empty store, not an error. Every mutation is broadcast so that other
//! views of the same guest session observe the change.
//!
//! This store is the single source of truth until login, at which point its
//! snapshot is handed to `CartService::sync_guest_cart` and the server cart
//! takes over.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use crate::models::{CartItem, CartKey, FavoriteItem};
use verbena_core::ProductId;

/// Change notification emitted after every successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestEvent {
    CartChanged,
    FavoritesChanged,
    Cleared,
}

/// The persisted shape: JSON-encoded arrays under fixed keys. The key
/// names are shared with the client-side storage this store mirrors.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct GuestSnapshot {
    #[serde(default)]
    cart: Vec<CartItem>,
    #[serde(default)]
    favorites: Vec<FavoriteItem>,
}

/// File-backed guest cart and favorites store.
pub struct GuestStore {
    path: PathBuf,
    state: Mutex<GuestSnapshot>,
    events: broadcast::Sender<GuestEvent>,
}

impl GuestStore {
    /// Open a guest store at `path`, tolerating a missing or corrupt file.
    #[must_use]
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = load_tolerant(&path);
        let (events, _) = broadcast::channel(16);
        Self {
            path,
            state: Mutex::new(state),
            events,
        }
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GuestEvent> {
        self.events.subscribe()
    }

    /// Current cart snapshot. Never fails.
    #[must_use]
    pub fn read_cart(&self) -> Vec<CartItem> {
        self.lock().cart.clone()
    }

    /// Current favorites snapshot. Never fails.
    #[must_use]
    pub fn read_favorites(&self) -> Vec<FavoriteItem> {
        self.lock().favorites.clone()
    }

    /// Add `quantity` of a product to the cart.
    ///
    /// An existing line with the same key is incremented; otherwise a line
    /// is appended. No bound on cart size is enforced.
    pub fn add_to_cart(&self, key: &CartKey, quantity: u32) {
        let now = Utc::now();
        {
            let mut state = self.lock();
            if let Some(line) = state.cart.iter_mut().find(|item| item.key() == *key) {
                line.quantity = line.quantity.saturating_add(quantity);
                line.updated_at = now;
            } else {
                state.cart.push(CartItem {
                    product_id: key.product_id.clone(),
                    variant: key.variant.clone(),
                    quantity,
                    added_at: now,
                    updated_at: now,
                });
            }
            self.persist(&state);
        }
        let _ = self.events.send(GuestEvent::CartChanged);
    }

    /// Apply a quantity delta to one line, mirroring the authenticated
    /// cart's rules: a resulting quantity of zero or less removes the
    /// line, and a non-positive delta on an absent line is a no-op.
    /// Returns the line as stored afterwards.
    pub fn adjust_cart(&self, key: &CartKey, delta: i64) -> Option<CartItem> {
        let now = Utc::now();
        let result = {
            let mut state = self.lock();
            let current = state
                .cart
                .iter()
                .find(|item| item.key() == *key)
                .map_or(0, |item| i64::from(item.quantity));
            let new_quantity = current + delta;

            if new_quantity <= 0 {
                if current == 0 {
                    return None;
                }
                state.cart.retain(|item| item.key() != *key);
                self.persist(&state);
                None
            } else {
                let quantity = u32::try_from(new_quantity).unwrap_or(u32::MAX);
                let line = if let Some(line) =
                    state.cart.iter_mut().find(|item| item.key() == *key)
                {
                    line.quantity = quantity;
                    line.updated_at = now;
                    line.clone()
                } else {
                    let line = CartItem {
                        product_id: key.product_id.clone(),
                        variant: key.variant.clone(),
                        quantity,
                        added_at: now,
                        updated_at: now,
                    };
                    state.cart.push(line.clone());
                    line
                };
                self.persist(&state);
                Some(line)
            }
        };
        let _ = self.events.send(GuestEvent::CartChanged);
        result
    }

    /// Remove the line with the given key. No-op if absent.
    pub fn remove_from_cart(&self, key: &CartKey) {
        {
            let mut state = self.lock();
            state.cart.retain(|item| item.key() != *key);
            self.persist(&state);
        }
        let _ = self.events.send(GuestEvent::CartChanged);
    }

    /// Add a product to favorites. No-op if already present.
    pub fn add_favorite(&self, product_id: &ProductId) {
        {
            let mut state = self.lock();
            if !state
                .favorites
                .iter()
                .any(|fav| fav.product_id == *product_id)
            {
                state.favorites.push(FavoriteItem {
                    product_id: product_id.clone(),
                    added_at: Utc::now(),
                });
            }
            self.persist(&state);
        }
        let _ = self.events.send(GuestEvent::FavoritesChanged);
    }

    /// Remove a product from favorites. No-op if absent.
    pub fn remove_favorite(&self, product_id: &ProductId) {
        {
            let mut state = self.lock();
            state.favorites.retain(|fav| fav.product_id != *product_id);
            self.persist(&state);
        }
        let _ = self.events.send(GuestEvent::FavoritesChanged);
    }

    /// Empty both cart and favorites. Called after a successful login sync.
    pub fn clear(&self) {
        {
            let mut state = self.lock();
            *state = GuestSnapshot::default();
            self.persist(&state);
        }
        let _ = self.events.send(GuestEvent::Cleared);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GuestSnapshot> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Best-effort write-through. A failed write keeps the in-memory state
    /// authoritative for this session.
    fn persist(&self, state: &GuestSnapshot) {
        match serde_json::to_vec(state) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&self.path, bytes) {
                    warn!(path = %self.path.display(), error = %e, "failed to persist guest store");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode guest store"),
        }
    }
}

/// Load a snapshot, mapping every failure mode to the empty store.
fn load_tolerant(path: &Path) -> GuestSnapshot {
    let Ok(bytes) = std::fs::read(path) else {
        return GuestSnapshot::default();
    };
    match serde_json::from_slice(&bytes) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt guest store, treating as empty");
            GuestSnapshot::default()
        }
    }
}
