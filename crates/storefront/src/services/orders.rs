//! Order finalization from payment notifications, and order lifecycle.
//!
//! The payment collaborator delivers notifications at least once and the
//! transport carries no trustworthy amounts, so finalization always
//! re-fetches the payment by id and works from the metadata frozen at
//! preference time. The order document id is derived from the payment id
//! and written create-if-absent, which makes a redelivered notification
//! converge on the same single order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, json};
use tracing::{info, instrument, warn};

use verbena_core::{OrderId, OrderStatus, ProductId, UserId};

use crate::error::{AppError, Result};
use crate::models::order::{Order, OrderLineItem};
use crate::models::{Product, ShippingAddress};
use crate::payments::{PaymentGateway, PaymentStatus, WebhookNotification};
use crate::store::{DocumentStore, StoreError, WriteBatch, collections, server_timestamp};

use super::CatalogService;
use super::cart::cart_doc_id;

/// What a webhook notification amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Not a payment-created notification; acknowledged and dropped.
    Ignored,
    /// An order for this payment already exists.
    AlreadyProcessed(OrderId),
    /// The payment exists but is not approved; acknowledged, no order.
    PaymentNotApproved,
    /// An order was created.
    Finalized(OrderId),
}

/// Order finalization and lifecycle.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn DocumentStore>,
    payments: Arc<dyn PaymentGateway>,
    catalog: CatalogService,
}

impl OrderService {
    /// Create an order service.
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        payments: Arc<dyn PaymentGateway>,
        catalog: CatalogService,
    ) -> Self {
        Self {
            store,
            payments,
            catalog,
        }
    }

    /// Drive the finalization state machine for one notification.
    ///
    /// Every error return means "do not acknowledge" - the collaborator
    /// redelivers and the deterministic order id keeps the retry safe.
    ///
    /// # Errors
    ///
    /// Propagates payment-provider and store failures, `NotFound` for a
    /// vanished address or product referenced by the frozen metadata.
    #[instrument(skip_all, fields(kind = %notification.kind, action = %notification.action))]
    pub async fn handle_notification(
        &self,
        notification: &WebhookNotification,
    ) -> Result<WebhookOutcome> {
        if !notification.is_payment_created() {
            return Ok(WebhookOutcome::Ignored);
        }

        let payment_id = &notification.data.id;
        let order_id = Order::id_for_payment(payment_id);
        if self
            .store
            .get(collections::ORDERS, order_id.as_str())
            .await?
            .is_some()
        {
            info!(%order_id, "payment already finalized, acknowledging retry");
            return Ok(WebhookOutcome::AlreadyProcessed(order_id));
        }

        let payment = self.payments.fetch_payment(payment_id).await?;
        if payment.status != PaymentStatus::Approved {
            info!(%payment_id, status = ?payment.status, "payment not approved, no order");
            return Ok(WebhookOutcome::PaymentNotApproved);
        }

        let metadata = &payment.metadata;
        let owner = &metadata.owner_id;

        let address: ShippingAddress = self
            .store
            .get(collections::ADDRESSES, metadata.address_id.as_str())
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)?
            .ok_or_else(|| {
                AppError::NotFound(format!("address {} for payment", metadata.address_id))
            })?;

        // Resolve each frozen line against fresh product state; the sales
        // counter increments below must not work from cached reads. Lines
        // sharing a product across variants fold into one counter, since
        // two updates to the same document in one batch would not stack.
        let mut line_items = Vec::with_capacity(metadata.lines.len());
        let mut sold: HashMap<ProductId, (Product, u64)> = HashMap::new();
        let mut subtotal = Decimal::ZERO;
        for frozen in &metadata.lines {
            let product = self.catalog.load_product(&frozen.key.product_id).await?;
            let line_total = product.price * Decimal::from(frozen.quantity);
            subtotal += line_total;
            line_items.push(OrderLineItem {
                product_id: frozen.key.product_id.clone(),
                variant: frozen.key.variant.clone(),
                name: product.name.clone(),
                unit_price: product.price,
                quantity: frozen.quantity,
                line_total,
            });
            sold.entry(frozen.key.product_id.clone())
                .or_insert((product, 0))
                .1 += u64::from(frozen.quantity);
        }

        let grand_total = subtotal + metadata.shipping_cost + metadata.tax;
        let order = Order {
            id: order_id.clone(),
            owner_id: owner.clone(),
            payment_id: payment_id.clone(),
            shipping_address: address,
            line_items,
            subtotal,
            shipping_cost: metadata.shipping_cost,
            tax: metadata.tax,
            grand_total,
            payment_method: payment
                .payment_method
                .clone()
                .unwrap_or_else(|| "unknown".to_owned()),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            shipped_at: None,
            delivered_at: None,
        };

        let mut order_doc = serde_json::to_value(&order).map_err(StoreError::from)?;
        if let Some(object) = order_doc.as_object_mut() {
            object.insert("created_at".to_owned(), server_timestamp());
        }

        let mut batch = WriteBatch::new();
        batch.create(collections::ORDERS, order_id.as_str(), order_doc);
        for frozen in &metadata.lines {
            batch.delete(collections::CART_ITEMS, &cart_doc_id(owner, &frozen.key));
        }
        for (product, quantity) in sold.values() {
            let mut fields = Map::new();
            fields.insert(
                "total_sales".to_owned(),
                json!(product.total_sales + quantity),
            );
            batch.update(collections::PRODUCTS, product.id.as_str(), fields);
        }

        match self.store.commit(batch).await {
            Ok(()) => {}
            // Lost a race with a concurrent delivery of the same payment;
            // the other worker's order stands.
            Err(StoreError::AlreadyExists { .. }) => {
                warn!(%order_id, "concurrent finalization, acknowledging");
                return Ok(WebhookOutcome::AlreadyProcessed(order_id));
            }
            Err(e) => return Err(e.into()),
        }

        for product_id in sold.keys() {
            self.catalog.invalidate(product_id).await;
        }

        info!(%order_id, %grand_total, "order finalized");
        Ok(WebhookOutcome::Finalized(order_id))
    }

    /// List a user's orders.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the query fails.
    pub async fn list_for_user(&self, owner: &UserId) -> Result<Vec<Order>> {
        let docs = self
            .store
            .query(collections::ORDERS, "owner_id", &json!(owner.as_str()))
            .await?;
        let mut orders = Vec::with_capacity(docs.len());
        for doc in docs {
            orders.push(doc.parse::<Order>()?);
        }
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// Fetch one of a user's orders.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when absent or owned by someone else.
    pub async fn get(&self, owner: &UserId, id: &OrderId) -> Result<Order> {
        let order = self.load(id).await?;
        if order.owner_id != *owner {
            return Err(AppError::NotFound(format!("order {id}")));
        }
        Ok(order)
    }

    /// Move an order along the status machine, stamping transition times.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` for a transition the status machine
    /// forbids, `AppError::NotFound` for a missing order.
    #[instrument(skip(self))]
    pub async fn transition(&self, id: &OrderId, to: OrderStatus) -> Result<Order> {
        let order = self.load(id).await?;
        if !order.status.can_transition_to(to) {
            return Err(AppError::Conflict(format!(
                "order {id} cannot move from {} to {to}",
                order.status
            )));
        }

        let now: DateTime<Utc> = Utc::now();
        let mut fields = Map::new();
        fields.insert("status".to_owned(), json!(to));
        match to {
            OrderStatus::Shipped => {
                fields.insert("shipped_at".to_owned(), json!(now));
            }
            OrderStatus::Delivered => {
                fields.insert("delivered_at".to_owned(), json!(now));
            }
            _ => {}
        }

        let mut batch = WriteBatch::new();
        batch.update(collections::ORDERS, id.as_str(), fields);
        self.store.commit(batch).await?;
        self.load(id).await
    }

    async fn load(&self, id: &OrderId) -> Result<Order> {
        let data = self
            .store
            .get(collections::ORDERS, id.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
        Ok(serde_json::from_value(data).map_err(StoreError::from)?)
    }
}
