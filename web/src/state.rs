//! Shared application state for handlers and middleware.

use std::sync::Arc;
use tomeshop_core::ShopEnvironment;
use tomeshop_core::providers::{
    CatalogProvider, Notifier, PaymentProcessor, TaskQueue, TokenVerifier,
};
use tomeshop_core::store::ShopStore;

/// Application state: the storefront environment plus the token verifier
/// used by the bearer middleware.
///
/// Generic over the collaborator implementations so the binary wires
/// PostgreSQL and Stripe while tests wire the in-memory mocks; handlers are
/// written once against the trait bounds.
pub struct AppState<S, C, P, N, Q, V> {
    /// Storefront operations and collaborators.
    pub env: Arc<ShopEnvironment<S, C, P, N, Q>>,
    /// Bearer-token verifier for authenticated routes.
    pub verifier: Arc<V>,
}

impl<S, C, P, N, Q, V> AppState<S, C, P, N, Q, V>
where
    S: ShopStore,
    C: CatalogProvider,
    P: PaymentProcessor,
    N: Notifier,
    Q: TaskQueue,
    V: TokenVerifier,
{
    /// Bundle an environment and a verifier into shared state.
    pub fn new(env: ShopEnvironment<S, C, P, N, Q>, verifier: V) -> Self {
        Self {
            env: Arc::new(env),
            verifier: Arc::new(verifier),
        }
    }
}

// Manual impl: the derived one would require Clone on every collaborator.
impl<S, C, P, N, Q, V> Clone for AppState<S, C, P, N, Q, V> {
    fn clone(&self) -> Self {
        Self {
            env: Arc::clone(&self.env),
            verifier: Arc::clone(&self.verifier),
        }
    }
}
