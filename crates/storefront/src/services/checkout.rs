//! Checkout pricing and preference creation.
//!
//! Cart lines never store prices; every total is derived from the current
//! catalog price at computation time. What the buyer is actually charged
//! for is frozen into the payment preference's metadata, which order
//! finalization later reads back.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use verbena_core::AddressId;

use crate::error::Result;
use crate::models::cart::{CartItem, CartKey};
use crate::payments::{
    BackUrls, FrozenLine, PaymentGateway, PaymentMetadata, Preference, PreferenceLineItem,
    PreferenceRequest,
};
use crate::shipping::RateQuote;

use super::CatalogService;

/// Currency every price in the catalog is denominated in.
const CURRENCY: &str = "MXN";

/// One cart line resolved against the current catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedLine {
    #[serde(flatten)]
    pub key: CartKey,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
}

/// A fully priced checkout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub grand_total: Decimal,
}

/// Pricing and preference creation.
#[derive(Clone)]
pub struct CheckoutService {
    catalog: CatalogService,
    payments: Arc<dyn PaymentGateway>,
    free_shipping_threshold: Decimal,
    tax_rate: Decimal,
    base_url: String,
}

impl CheckoutService {
    /// Create a checkout service.
    #[must_use]
    pub fn new(
        catalog: CatalogService,
        payments: Arc<dyn PaymentGateway>,
        free_shipping_threshold: Decimal,
        tax_rate: Decimal,
        base_url: String,
    ) -> Self {
        Self {
            catalog,
            payments,
            free_shipping_threshold,
            tax_rate,
            base_url,
        }
    }

    /// Price the cart against the current catalog.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if any line's product no longer exists;
    /// a cart referencing a vanished product cannot be priced at all.
    #[instrument(skip_all, fields(lines = cart.len()))]
    pub async fn compute_totals(
        &self,
        cart: &[CartItem],
        shipping_cost: Decimal,
        tax: Decimal,
    ) -> Result<Totals> {
        let mut lines = Vec::with_capacity(cart.len());
        let mut subtotal = Decimal::ZERO;

        for item in cart {
            let product = self.catalog.get_product(&item.product_id).await?;
            let line_total = product.price * Decimal::from(item.quantity);
            subtotal += line_total;
            lines.push(PricedLine {
                key: item.key(),
                name: product.name,
                unit_price: product.price,
                quantity: item.quantity,
                line_total,
            });
        }

        Ok(Totals {
            lines,
            subtotal,
            shipping_cost,
            tax,
            grand_total: subtotal + shipping_cost + tax,
        })
    }

    /// Shipping cost after the free-shipping threshold.
    ///
    /// A subtotal at or above the threshold ships free regardless of what
    /// the rate provider quoted.
    #[must_use]
    pub fn shipping_cost_for(&self, subtotal: Decimal, quote: &RateQuote) -> Decimal {
        if subtotal >= self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            quote.total_price
        }
    }

    /// Tax on a subtotal, rounded to cents.
    #[must_use]
    pub fn tax_for(&self, subtotal: Decimal) -> Decimal {
        (subtotal * self.tax_rate).round_dp(2)
    }

    /// Price the cart and create a payment preference for it.
    ///
    /// The preference metadata freezes the address id, the line snapshot,
    /// and the shipping/tax amounts; finalization charges exactly these
    /// regardless of later cart edits.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArgument` for an empty cart,
    /// `AppError::NotFound` for a vanished product, and the payment error
    /// mapping for provider failures.
    #[instrument(skip_all, fields(address = %address_id))]
    pub async fn begin_checkout(
        &self,
        owner: &verbena_core::UserId,
        address_id: &AddressId,
        cart: &[CartItem],
        quote: &RateQuote,
    ) -> Result<(Preference, Totals)> {
        if cart.is_empty() {
            return Err(crate::error::AppError::InvalidArgument(
                "cannot check out an empty cart".to_owned(),
            ));
        }

        // Subtotal first; the threshold decision depends on it.
        let provisional = self.compute_totals(cart, Decimal::ZERO, Decimal::ZERO).await?;
        let shipping_cost = self.shipping_cost_for(provisional.subtotal, quote);
        let tax = self.tax_for(provisional.subtotal);
        let totals = Totals {
            shipping_cost,
            tax,
            grand_total: provisional.subtotal + shipping_cost + tax,
            ..provisional
        };

        let mut line_items: Vec<PreferenceLineItem> = totals
            .lines
            .iter()
            .map(|line| PreferenceLineItem {
                title: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                currency: CURRENCY.to_owned(),
            })
            .collect();
        if shipping_cost > Decimal::ZERO {
            line_items.push(PreferenceLineItem {
                title: "Shipping".to_owned(),
                quantity: 1,
                unit_price: shipping_cost,
                currency: CURRENCY.to_owned(),
            });
        }

        let request = PreferenceRequest {
            line_items,
            metadata: PaymentMetadata {
                owner_id: owner.clone(),
                address_id: address_id.clone(),
                lines: totals
                    .lines
                    .iter()
                    .map(|line| FrozenLine {
                        key: line.key.clone(),
                        quantity: line.quantity,
                    })
                    .collect(),
                shipping_cost,
                tax,
            },
            back_urls: BackUrls {
                success: format!("{}/checkout/success", self.base_url),
                failure: format!("{}/checkout/failure", self.base_url),
                pending: format!("{}/checkout/pending", self.base_url),
            },
        };

        let preference = self.payments.create_preference(request).await?;
        Ok((preference, totals))
    }
}
