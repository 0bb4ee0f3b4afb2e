//! Route table and middleware stack.

use crate::handlers::{cart, catalog, collection, health, orders, payments, tasks, webhooks};
use crate::middleware::{correlation_id_layer, require_bearer};
use crate::state::AppState;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use tomeshop_core::providers::{
    CatalogProvider, Notifier, PaymentProcessor, TaskQueue, TokenVerifier,
};
use tomeshop_core::store::ShopStore;
use tower_http::cors::CorsLayer;

/// Build the application router.
///
/// The webhook endpoint and the health probe are public; the webhook
/// authenticates through its signature, not a bearer token. Everything else
/// sits behind the bearer middleware.
pub fn router<S, C, P, N, Q, V>(state: AppState<S, C, P, N, Q, V>) -> Router
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    let public = Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/webhooks/payment",
            post(webhooks::payment::<S, C, P, N, Q, V>),
        );

    let authed = Router::new()
        .route(
            "/api/cart",
            get(cart::view::<S, C, P, N, Q, V>).delete(cart::clear::<S, C, P, N, Q, V>),
        )
        .route("/api/cart/items", post(cart::add_item::<S, C, P, N, Q, V>))
        .route(
            "/api/cart/items/:volume_id",
            put(cart::set_quantity::<S, C, P, N, Q, V>)
                .delete(cart::remove_item::<S, C, P, N, Q, V>),
        )
        .route(
            "/api/orders",
            post(orders::commit::<S, C, P, N, Q, V>).get(orders::history::<S, C, P, N, Q, V>),
        )
        .route(
            "/api/orders/:reference",
            get(orders::detail::<S, C, P, N, Q, V>),
        )
        .route(
            "/api/orders/:reference/payment-intent",
            post(payments::create_intent::<S, C, P, N, Q, V>),
        )
        .route(
            "/api/payments/:lookup/status",
            get(payments::status::<S, C, P, N, Q, V>),
        )
        .route("/api/collection", get(collection::list::<S, C, P, N, Q, V>))
        .route(
            "/api/catalog/series/:series_id/reconcile",
            post(catalog::reconcile::<S, C, P, N, Q, V>),
        )
        .route(
            "/api/tasks/process-order",
            post(tasks::process_order::<S, C, P, N, Q, V>),
        )
        .route("/api/tasks/:task_id", get(tasks::status::<S, C, P, N, Q, V>))
        .route_layer(from_fn_with_state(
            state.clone(),
            require_bearer::<S, C, P, N, Q, V>,
        ));

    public
        .merge(authed)
        .layer(correlation_id_layer())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
