//! Collaborator traits for the storefront core.
//!
//! This module defines traits for every external dependency the core talks
//! to: the catalog, the payment processor, the task queue, the notification
//! channel and the auth token verifier. The operations in this crate depend
//! only on these traits; the binary wires concrete implementations
//! (PostgreSQL, Stripe, an in-process queue) and tests wire the in-memory
//! mocks from [`crate::mocks`].

use crate::types::{Money, SeriesId, VolumeId};
use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod notify;
pub mod payment;
pub mod tasks;
pub mod token;

pub use catalog::CatalogProvider;
pub use notify::{Notifier, TaskQueueNotifier};
pub use payment::PaymentProcessor;
pub use tasks::TaskQueue;
pub use token::TokenVerifier;

/// Live pricing data for one volume, as served by the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumePricing {
    /// The volume.
    pub volume_id: VolumeId,
    /// Series the volume belongs to.
    pub series_id: SeriesId,
    /// Volume number within the series.
    pub number: u32,
    /// Current catalog price per unit.
    pub unit_price: Money,
}

/// Result of reconciling a series' volume rows against its declared count.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeReconciliation {
    /// Volumes created to reach the declared count.
    pub created: u32,
    /// Surplus volumes removed above the declared count.
    pub pruned: u32,
}

/// Outbound request to create a processor transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    /// Amount in minor units.
    pub amount: Money,
    /// ISO currency code.
    pub currency: String,
    /// Metadata attached for reconciliation and support lookups.
    pub metadata: serde_json::Value,
    /// Idempotency key forwarded to the processor. The creation call is
    /// non-idempotent on its own and must never be issued twice without it.
    pub idempotency_key: String,
}

/// A transaction as returned by the processor's creation call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorIntent {
    /// Processor-assigned transaction id.
    pub transaction_id: String,
    /// Opaque secret for the payer's client-side SDK.
    pub client_secret: String,
    /// Raw processor status string.
    pub status: String,
    /// Metadata echoed back by the processor.
    pub metadata: serde_json::Value,
}

/// Handle to a submitted background task.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(pub String);

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution state of a background task.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Accepted, not started.
    Queued,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

/// Status report for a background task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// The task.
    pub handle: TaskHandle,
    /// Execution state.
    pub state: TaskState,
    /// Result payload, present once completed.
    pub result: Option<serde_json::Value>,
    /// Error description, present once failed.
    pub error: Option<String>,
}
