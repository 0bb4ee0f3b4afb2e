//! HTTP handlers, one module per resource.
//!
//! Handlers are thin: extract identity and input, call the storefront
//! operation, translate the domain result through [`crate::error::AppError`].
//! They are generic over the collaborator traits so the same functions serve
//! the PostgreSQL/Stripe binary and the mock-backed tests.

pub mod cart;
pub mod catalog;
pub mod collection;
pub mod health;
pub mod orders;
pub mod payments;
pub mod tasks;
pub mod webhooks;
