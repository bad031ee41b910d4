//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::guest::GuestStore;
use crate::identity::IdentityProvider;
use crate::payments::PaymentGateway;
use crate::services::{
    AddressService, CartService, CatalogService, CheckoutService, OrderService, UserLocks,
};
use crate::shipping::RateProvider;
use crate::store::DocumentStore;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Every external collaborator (document
/// store, identity provider, payment gateway) is injected behind its
/// trait, so tests assemble a state over in-memory doubles.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    identity: Arc<dyn IdentityProvider>,
    shipping: Arc<dyn RateProvider>,
    guest: GuestStore,
    cart: CartService,
    addresses: AddressService,
    checkout: CheckoutService,
    orders: OrderService,
}

impl AppState {
    /// Assemble the application state over injected collaborators.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        payments: Arc<dyn PaymentGateway>,
        shipping: Arc<dyn RateProvider>,
        guest: GuestStore,
    ) -> Self {
        let locks = UserLocks::new();
        let catalog = CatalogService::new(Arc::clone(&store));
        let cart = CartService::new(Arc::clone(&store));
        let addresses = AddressService::new(Arc::clone(&store), locks);
        let checkout = CheckoutService::new(
            catalog.clone(),
            Arc::clone(&payments),
            config.shipping.free_shipping_threshold,
            config.tax_rate,
            config.base_url.clone(),
        );
        let orders = OrderService::new(Arc::clone(&store), payments, catalog);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                identity,
                shipping,
                guest,
                cart,
                addresses,
                checkout,
                orders,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the identity provider.
    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.identity.as_ref()
    }

    /// Get the shipping rate provider.
    #[must_use]
    pub fn shipping(&self) -> &dyn RateProvider {
        self.inner.shipping.as_ref()
    }

    /// Get the guest cart store.
    #[must_use]
    pub fn guest(&self) -> &GuestStore {
        &self.inner.guest
    }

    /// Get the cart service.
    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    /// Get the address service.
    #[must_use]
    pub fn addresses(&self) -> &AddressService {
        &self.inner.addresses
    }

    /// Get the checkout service.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    /// Get the order service.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }
}
