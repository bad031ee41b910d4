//! Order model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use verbena_core::{OrderId, OrderStatus, PaymentId, ProductId, UserId};

/// A priced order line, frozen at finalization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
}

/// A finalized order.
///
/// Created exactly once per approved payment notification. Prices and the
/// shipping address are snapshots; later catalog or address edits never
/// change an order. `grand_total = subtotal + shipping_cost + tax`, computed
/// once at creation and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner_id: UserId,
    pub payment_id: PaymentId,
    pub shipping_address: super::ShippingAddress,
    pub line_items: Vec<OrderLineItem>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub grand_total: Decimal,
    pub payment_method: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Derive the order document id for a payment.
    ///
    /// Deterministic on purpose: together with create-if-absent batch
    /// semantics it guarantees at most one order per payment id, even when
    /// the payment collaborator redelivers a notification.
    #[must_use]
    pub fn id_for_payment(payment_id: &PaymentId) -> OrderId {
        OrderId::new(format!("ord_{payment_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_deterministic_per_payment() {
        let payment = PaymentId::new("pay-42");
        assert_eq!(
            Order::id_for_payment(&payment),
            Order::id_for_payment(&payment)
        );
        assert_eq!(Order::id_for_payment(&payment).as_str(), "ord_pay-42");
    }
}
