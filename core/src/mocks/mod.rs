//! In-memory mock implementations of every collaborator trait.
//!
//! Available to downstream crates behind the `test-utils` feature (enabled
//! by default) so integration tests and examples can run without PostgreSQL,
//! Stripe or a task broker. Each mock serializes through one interior mutex,
//! which makes every logical operation atomic the same way the production
//! store's transactions do.

mod notify;
mod payment;
mod shop;
mod tasks;
mod token;

pub use notify::MockNotifier;
pub use payment::MockPaymentProcessor;
pub use shop::InMemoryShop;
pub use tasks::MockTaskQueue;
pub use token::MockTokenVerifier;

pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A poisoned mutex only means another test thread panicked mid-write;
    // the data is still the best available state.
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
