//! PostgreSQL persistence for the Tomeshop storefront core.
//!
//! Implements the store and catalog seams from `tomeshop-core` over sqlx.
//! Every compound operation of the store contract (`commit_order`,
//! `apply_payment_success`) runs inside a single transaction with row-level
//! locking, so the atomicity and serialization guarantees the core relies on
//! hold under concurrent requests.
//!
//! # Example
//!
//! ```no_run
//! use sqlx::PgPool;
//! use tomeshop_postgres::{PostgresCatalog, PostgresShopStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/tomeshop").await?;
//! let store = PostgresShopStore::new(pool.clone());
//! store.migrate().await?;
//! let catalog = PostgresCatalog::new(pool);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod store;

pub use catalog::PostgresCatalog;
pub use store::PostgresShopStore;

use tomeshop_core::ShopError;

pub(crate) fn db_error(context: &str, error: &sqlx::Error) -> ShopError {
    ShopError::database(format!("{context}: {error}"))
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}
