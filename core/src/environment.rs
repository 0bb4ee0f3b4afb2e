//! Collaborator bundle handed to every storefront operation.

use crate::config::{CartPolicy, PaymentConfig};
use crate::providers::{CatalogProvider, Notifier, PaymentProcessor, TaskQueue};
use crate::store::ShopStore;

/// All collaborators and policy knobs for the storefront core.
///
/// The business operations live as methods on this struct, split by concern
/// across [`crate::cart`], [`crate::orders`], [`crate::payments`],
/// [`crate::reconciler`] and [`crate::ownership`]. The binary builds one
/// environment over PostgreSQL and Stripe; tests build one over the mocks.
#[derive(Clone, Debug)]
pub struct ShopEnvironment<S, C, P, N, Q> {
    /// Persistence for carts, orders, payments and ledgers.
    pub store: S,
    /// Catalog pricing and volume data.
    pub catalog: C,
    /// External payment processor client.
    pub processor: P,
    /// Order-paid notification channel.
    pub notifier: N,
    /// Background task queue.
    pub tasks: Q,
    /// Cart mutation policy.
    pub cart_policy: CartPolicy,
    /// Payment bridge configuration.
    pub payment: PaymentConfig,
}

impl<S, C, P, N, Q> ShopEnvironment<S, C, P, N, Q>
where
    S: ShopStore,
    C: CatalogProvider,
    P: PaymentProcessor,
    N: Notifier,
    Q: TaskQueue,
{
    /// Assemble an environment with default policies.
    pub fn new(store: S, catalog: C, processor: P, notifier: N, tasks: Q) -> Self {
        Self {
            store,
            catalog,
            processor,
            notifier,
            tasks,
            cart_policy: CartPolicy::default(),
            payment: PaymentConfig::default(),
        }
    }

    /// Replace the cart policy.
    #[must_use]
    pub fn with_cart_policy(mut self, policy: CartPolicy) -> Self {
        self.cart_policy = policy;
        self
    }

    /// Replace the payment configuration.
    #[must_use]
    pub fn with_payment_config(mut self, config: PaymentConfig) -> Self {
        self.payment = config;
        self
    }
}
