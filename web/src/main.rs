//! Tomeshop HTTP server binary.
//!
//! Wires the PostgreSQL store, the Stripe client, the in-process task queue
//! and the HTTP token verifier into one environment, runs migrations, and
//! serves the router. All configuration comes from the environment.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tomeshop_core::providers::TaskQueueNotifier;
use tomeshop_core::{PaymentConfig, ShopEnvironment};
use tomeshop_postgres::catalog::PostgresCatalog;
use tomeshop_postgres::store::PostgresShopStore;
use tomeshop_web::{AppState, HttpTokenVerifier, StripeClient, StripeConfig, TokioTaskQueue, router};
use tracing_subscriber::EnvFilter;

fn required_var(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let database_url = required_var("DATABASE_URL")?;
    let stripe_api_key = required_var("STRIPE_API_KEY")?;
    let stripe_webhook_secret = required_var("STRIPE_WEBHOOK_SECRET")?;
    let introspection_url = required_var("AUTH_INTROSPECTION_URL")?;
    let bind_addr =
        std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .context("connecting to the database")?;

    let store = PostgresShopStore::new(pool.clone());
    store.migrate().await.context("running migrations")?;
    let catalog = PostgresCatalog::new(pool);

    let payment = std::env::var("CURRENCY")
        .map_or_else(|_| PaymentConfig::default(), PaymentConfig::new);

    let queue = TokioTaskQueue::new();
    let notifier = TaskQueueNotifier::new(queue.clone());
    let mut stripe = StripeConfig::new(stripe_api_key, stripe_webhook_secret);
    stripe.timeout = payment.processor_timeout;
    stripe.signature_tolerance = payment.signature_tolerance;
    let processor = StripeClient::new(stripe);
    let env = ShopEnvironment::new(store, catalog, processor, notifier, queue)
        .with_payment_config(payment);
    let verifier = HttpTokenVerifier::new(introspection_url, Duration::from_secs(5));

    let app = router(AppState::new(env, verifier));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(%bind_addr, "tomeshop-web listening");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
