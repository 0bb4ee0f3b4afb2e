//! Background task queue collaborator trait.

use super::{TaskHandle, TaskStatus};
use crate::error::Result;

/// Generic async task submission interface.
///
/// The core only depends on fire-and-forget submission and status polling;
/// task internals (worker pools, brokers) are the implementation's concern.
pub trait TaskQueue: Send + Sync {
    /// Submit a named task with a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::ExternalService` if the queue refuses the task.
    fn submit(
        &self,
        task_name: &str,
        payload: serde_json::Value,
    ) -> impl std::future::Future<Output = Result<TaskHandle>> + Send;

    /// Poll the status of a previously submitted task.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an unknown handle.
    fn status(
        &self,
        handle: &TaskHandle,
    ) -> impl std::future::Future<Output = Result<TaskStatus>> + Send;
}
