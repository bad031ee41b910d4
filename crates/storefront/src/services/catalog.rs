//! Catalog reads with caching.
//!
//! The storefront never writes product data except the cumulative sales
//! counter during order finalization. Interactive pricing reads go through
//! a short-lived cache (the cart page re-derives its total on every view);
//! finalization bypasses the cache so the sales counter is incremented
//! against fresh state.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde_json::json;
use tracing::instrument;

use verbena_core::ProductId;

use crate::error::{AppError, Result};
use crate::models::Product;
use crate::store::{DocumentStore, collections};

/// Cached catalog reader.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn DocumentStore>,
    cache: Cache<ProductId, Product>,
}

impl CatalogService {
    /// Create a catalog service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();
        Self { store, cache }
    }

    /// Get a product, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product does not exist - a
    /// missing product aborts whatever computation needed it.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product> {
        if let Some(product) = self.cache.get(id).await {
            return Ok(product);
        }
        let product = self.load_product(id).await?;
        self.cache.insert(id.clone(), product.clone()).await;
        Ok(product)
    }

    /// Get a product directly from the store, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product does not exist.
    pub async fn load_product(&self, id: &ProductId) -> Result<Product> {
        let data = self
            .store
            .get(collections::PRODUCTS, id.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
        let product: Product = serde_json::from_value(data)
            .map_err(|e| AppError::Internal(format!("malformed product {id}: {e}")))?;
        Ok(product)
    }

    /// Drop a product from the cache (after a sales-counter write).
    pub async fn invalidate(&self, id: &ProductId) {
        self.cache.invalidate(id).await;
    }
}

/// Test helper: seed a product document shape.
#[must_use]
pub fn product_doc(id: &str, name: &str, price: &str, total_sales: u64) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "price": price,
        "total_sales": total_sales,
    })
}
