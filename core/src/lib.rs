//! Domain model and consistency core for the Tomeshop manga storefront.
//!
//! This crate owns the part of the system where correctness is hard: the
//! cart mutation model, the order snapshot/commit protocol, and the payment
//! webhook reconciliation state machine. Everything else (HTTP, persistence,
//! the payment processor itself) plugs in through traits.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              ShopEnvironment                 │
//! │  cart / orders / payments / reconciler ops   │
//! ├───────────┬──────────┬───────────┬───────────┤
//! │ ShopStore │ Catalog  │ Payment   │ Notifier  │
//! │ (trait)   │ Provider │ Processor │ TaskQueue │
//! └───────────┴──────────┴───────────┴───────────┘
//!       ▲           ▲          ▲           ▲
//!   postgres     postgres   Stripe      in-process
//!   (sqlx)       (sqlx)     client      queue
//! ```
//!
//! The environment holds one implementation of each collaborator trait and
//! exposes the business operations as methods. Implementations are injected
//! by the binary (PostgreSQL + Stripe) or by tests (the in-memory mocks in
//! [`mocks`]).
//!
//! # Consistency guarantees
//!
//! - An order is an immutable snapshot: totals and per-line unit prices are
//!   frozen at commit time and never recomputed from the catalog.
//! - At most one payment intent ever exists per order.
//! - Webhook events are deduplicated through a ledger keyed by the processor
//!   event id; replaying a delivery is a no-op.
//! - Payment success application is atomic: payment status, order status,
//!   ownership grants and cart clearing all commit together or not at all.

pub mod cart;
pub mod config;
pub mod environment;
pub mod error;
pub mod orders;
pub mod ownership;
pub mod payments;
pub mod providers;
pub mod reconciler;
pub mod store;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use config::{CartPolicy, PaymentConfig};
pub use environment::ShopEnvironment;
pub use error::{Result, ShopError};
pub use reconciler::WebhookOutcome;
pub use store::ShopStore;
pub use types::{
    Money, OrderId, OrderReference, OrderStatus, PaymentId, PaymentStatus, SeriesId, UserId,
    VolumeId,
};
