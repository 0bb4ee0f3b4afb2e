//! Axum HTTP layer for the Tomeshop storefront.
//!
//! The web crate is a thin imperative shell: handlers extract and validate
//! request data, call one operation on the shared
//! [`ShopEnvironment`](tomeshop_core::ShopEnvironment), and serialize the
//! result. All invariants live in `tomeshop-core`; nothing in this crate
//! mutates domain state directly.
//!
//! # Request flow
//!
//! 1. The correlation middleware tags the request with an `X-Correlation-ID`
//!    and a tracing span.
//! 2. For authenticated routes, the bearer middleware resolves the
//!    `Authorization` header to a [`UserId`](tomeshop_core::UserId) through
//!    the token verifier and stores it in request extensions.
//! 3. The handler runs one environment operation and maps domain errors to
//!    HTTP through [`AppError`].
//!
//! The webhook endpoint is deliberately outside the bearer middleware: it
//! authenticates with the processor's signature scheme instead.

pub mod auth;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
pub mod stripe;
pub mod tasks;

pub use auth::HttpTokenVerifier;
pub use error::AppError;
pub use extractors::{AuthUser, CorrelationId};
pub use middleware::{correlation_id_layer, CORRELATION_ID_HEADER};
pub use router::router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeConfig};
pub use tasks::TokioTaskQueue;
