//! Document store collaborator contract.
//!
//! The storefront treats its persistence layer as an external, collection
//! oriented document store: get-by-id, equality query, and batched writes
//! committed all-or-nothing. The concrete backend is injected through
//! [`crate::state::AppState`]; tests and local development use the
//! in-memory implementation in [`memory`].
//!
//! The discipline throughout the engine is "read the relevant documents,
//! then commit a single atomic batch". The batch gives atomicity of the
//! write set, not isolation - callers that need serialization (default
//! address toggling) take a per-user lock around the read-then-write.

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;

/// Collection names used by the storefront.
pub mod collections {
    /// Authenticated cart lines, one document per `(owner, cart key)`.
    pub const CART_ITEMS: &str = "cart_items";
    /// Favorite products, one document per `(owner, product)`.
    pub const FAVORITES: &str = "favorites";
    /// Shipping addresses.
    pub const ADDRESSES: &str = "addresses";
    /// Catalog products (read-mostly from this service).
    pub const PRODUCTS: &str = "products";
    /// Finalized orders.
    pub const ORDERS: &str = "orders";
}

/// Sentinel value replaced with the store's clock at commit time.
///
/// Mirrors the server-timestamp field value of document databases: the
/// store, not the client, assigns `created_at`-style timestamps.
pub const SERVER_TIMESTAMP: &str = "__server_timestamp__";

/// Build a server-timestamp sentinel field value.
#[must_use]
pub fn server_timestamp() -> Value {
    Value::String(SERVER_TIMESTAMP.to_owned())
}

/// Errors from document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A `create` targeted an id that already exists.
    #[error("document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    /// An `update` targeted a missing document.
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// The backend rejected or failed the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A document could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A document returned by a query, paired with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// Deserialize the document body into a typed value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` if the body does not match `T`.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// A single write inside a batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Create or replace the document.
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    /// Create the document; the batch fails if the id already exists.
    Create {
        collection: String,
        id: String,
        data: Value,
    },
    /// Merge the given top-level fields into an existing document.
    Update {
        collection: String,
        id: String,
        fields: serde_json::Map<String, Value>,
    },
    /// Delete the document; deleting a missing document is a no-op.
    Delete { collection: String, id: String },
}

/// An all-or-nothing set of writes.
///
/// Built up by the engine, then handed to [`DocumentStore::commit`]. If any
/// operation cannot be applied, none are.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the batch contains no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Queue a create-or-replace write.
    pub fn set(&mut self, collection: &str, id: &str, data: Value) -> &mut Self {
        self.ops.push(WriteOp::Set {
            collection: collection.to_owned(),
            id: id.to_owned(),
            data,
        });
        self
    }

    /// Queue a create that fails if the document already exists.
    pub fn create(&mut self, collection: &str, id: &str, data: Value) -> &mut Self {
        self.ops.push(WriteOp::Create {
            collection: collection.to_owned(),
            id: id.to_owned(),
            data,
        });
        self
    }

    /// Queue a field-merge update of an existing document.
    pub fn update(
        &mut self,
        collection: &str,
        id: &str,
        fields: serde_json::Map<String, Value>,
    ) -> &mut Self {
        self.ops.push(WriteOp::Update {
            collection: collection.to_owned(),
            id: id.to_owned(),
            fields,
        });
        self
    }

    /// Queue a delete.
    pub fn delete(&mut self, collection: &str, id: &str) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_owned(),
            id: id.to_owned(),
        });
        self
    }

    /// Consume the batch, returning its operations.
    #[must_use]
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Contract the engine depends on for persistence.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a single document by id. `Ok(None)` when absent.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Fetch all documents whose top-level `field` equals `value`.
    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError>;

    /// Apply a batch of writes atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
