//! In-memory document store.
//!
//! Used by tests and local development. Commits are validated against the
//! current state before anything is applied, so a rejected batch leaves the
//! store untouched. Failure injection lets tests exercise the all-or-nothing
//! guarantee of order finalization.

use std::collections::{BTreeMap, HashMap};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use super::{Document, DocumentStore, SERVER_TIMESTAMP, StoreError, WriteBatch, WriteOp};

type Collections = HashMap<String, BTreeMap<String, Value>>;

/// An in-memory [`DocumentStore`] with atomic batch commits.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Collections>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit` call fail without applying any writes.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Insert a document directly, bypassing batch semantics. Test setup only.
    pub fn seed(&self, collection: &str, id: &str, data: Value) {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard
            .entry(collection.to_owned())
            .or_default()
            .insert(id.to_owned(), resolve_timestamps(data));
    }

    /// Number of documents currently in a collection.
    #[must_use]
    pub fn count(&self, collection: &str) -> usize {
        let guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.get(collection).map_or(0, BTreeMap::len)
    }
}

/// Replace server-timestamp sentinels in top-level fields with the clock.
fn resolve_timestamps(mut data: Value) -> Value {
    if let Some(map) = data.as_object_mut() {
        let now = Value::String(Utc::now().to_rfc3339());
        for value in map.values_mut() {
            if value.as_str() == Some(SERVER_TIMESTAMP) {
                *value = now.clone();
            }
        }
    }
    data
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let docs = guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, data)| data.get(field) == Some(value))
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected commit failure".to_owned(),
            ));
        }

        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let ops = batch.into_ops();

        // Validate every op against current state before applying any.
        for op in &ops {
            match op {
                WriteOp::Create { collection, id, .. } => {
                    if guard
                        .get(collection.as_str())
                        .is_some_and(|docs| docs.contains_key(id))
                    {
                        return Err(StoreError::AlreadyExists {
                            collection: collection.clone(),
                            id: id.clone(),
                        });
                    }
                }
                WriteOp::Update { collection, id, .. } => {
                    if !guard
                        .get(collection.as_str())
                        .is_some_and(|docs| docs.contains_key(id))
                    {
                        return Err(StoreError::NotFound {
                            collection: collection.clone(),
                            id: id.clone(),
                        });
                    }
                }
                WriteOp::Set { .. } | WriteOp::Delete { .. } => {}
            }
        }

        for op in ops {
            match op {
                WriteOp::Set {
                    collection,
                    id,
                    data,
                }
                | WriteOp::Create {
                    collection,
                    id,
                    data,
                } => {
                    guard
                        .entry(collection)
                        .or_default()
                        .insert(id, resolve_timestamps(data));
                }
                WriteOp::Update {
                    collection,
                    id,
                    fields,
                } => {
                    if let Some(doc) = guard
                        .get_mut(&collection)
                        .and_then(|docs| docs.get_mut(&id))
                        && let Some(map) = doc.as_object_mut()
                    {
                        for (key, value) in resolve_fields(fields) {
                            map.insert(key, value);
                        }
                    }
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(docs) = guard.get_mut(&collection) {
                        docs.remove(&id);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Resolve timestamp sentinels in an update's field map.
fn resolve_fields(fields: serde_json::Map<String, Value>) -> serde_json::Map<String, Value> {
    let now = Value::String(Utc::now().to_rfc3339());
    fields
        .into_iter()
        .map(|(key, value)| {
            if value.as_str() == Some(SERVER_TIMESTAMP) {
                (key, now.clone())
            } else {
                (key, value)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();

        let mut batch = WriteBatch::new();
        batch.set("products", "sku-1", json!({"name": "Candle", "price": "19.99"}));
        store.commit(batch).await.expect("commit");

        let doc = store.get("products", "sku-1").await.expect("get");
        assert_eq!(doc.expect("present")["name"], "Candle");

        let mut batch = WriteBatch::new();
        batch.delete("products", "sku-1");
        store.commit(batch).await.expect("commit");

        assert!(store.get("products", "sku-1").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_query_by_field() {
        let store = MemoryStore::new();
        store.seed("cart_items", "u1:a", json!({"owner_id": "u1", "quantity": 1}));
        store.seed("cart_items", "u1:b", json!({"owner_id": "u1", "quantity": 2}));
        store.seed("cart_items", "u2:a", json!({"owner_id": "u2", "quantity": 3}));

        let docs = store
            .query("cart_items", "owner_id", &json!("u1"))
            .await
            .expect("query");
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.data["owner_id"] == "u1"));
    }

    #[tokio::test]
    async fn test_create_fails_on_existing_id() {
        let store = MemoryStore::new();
        store.seed("orders", "ord_1", json!({"status": "pending"}));

        let mut batch = WriteBatch::new();
        batch.create("orders", "ord_1", json!({"status": "pending"}));
        let err = store.commit(batch).await.expect_err("duplicate create");
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_failed_batch_applies_nothing() {
        let store = MemoryStore::new();
        store.seed("cart_items", "u1:a", json!({"owner_id": "u1"}));

        // The delete is valid but the create collides, so neither applies.
        store.seed("orders", "ord_1", json!({}));
        let mut batch = WriteBatch::new();
        batch.delete("cart_items", "u1:a");
        batch.create("orders", "ord_1", json!({}));
        store.commit(batch).await.expect_err("should fail");

        assert!(
            store
                .get("cart_items", "u1:a")
                .await
                .expect("get")
                .is_some(),
            "delete must not apply when a sibling op fails"
        );
    }

    #[tokio::test]
    async fn test_injected_commit_failure() {
        let store = MemoryStore::new();
        store.fail_next_commit();

        let mut batch = WriteBatch::new();
        batch.set("orders", "ord_1", json!({}));
        store.commit(batch).await.expect_err("injected failure");
        assert_eq!(store.count("orders"), 0);

        // Only the next commit fails; subsequent ones succeed.
        let mut batch = WriteBatch::new();
        batch.set("orders", "ord_1", json!({}));
        store.commit(batch).await.expect("second commit");
        assert_eq!(store.count("orders"), 1);
    }

    #[tokio::test]
    async fn test_server_timestamp_resolved() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.set(
            "orders",
            "ord_1",
            json!({"created_at": super::SERVER_TIMESTAMP, "status": "pending"}),
        );
        store.commit(batch).await.expect("commit");

        let doc = store.get("orders", "ord_1").await.expect("get").expect("present");
        let created_at = doc["created_at"].as_str().expect("string");
        assert_ne!(created_at, super::SERVER_TIMESTAMP);
        assert!(created_at.parse::<chrono::DateTime<Utc>>().is_ok());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new();
        store.seed("addresses", "a1", json!({"owner_id": "u1", "is_default": true, "city": "Oaxaca"}));

        let mut batch = WriteBatch::new();
        let mut fields = serde_json::Map::new();
        fields.insert("is_default".to_owned(), json!(false));
        batch.update("addresses", "a1", fields);
        store.commit(batch).await.expect("commit");

        let doc = store.get("addresses", "a1").await.expect("get").expect("present");
        assert_eq!(doc["is_default"], json!(false));
        assert_eq!(doc["city"], json!("Oaxaca"));
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.update("addresses", "ghost", serde_json::Map::new());
        let err = store.commit(batch).await.expect_err("missing doc");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
