//! In-process background task queue built on Tokio.

use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tomeshop_core::error::Result;
use tomeshop_core::providers::{TaskHandle, TaskQueue, TaskState, TaskStatus};
use uuid::Uuid;

/// Task queue that runs work on the Tokio runtime.
///
/// Each submission is recorded in a shared status table and handed to a
/// spawned task. Delivery side effects (mail, push) live behind the task
/// names; the queue itself only tracks lifecycle so callers can poll
/// status by handle.
#[derive(Clone, Debug, Default)]
pub struct TokioTaskQueue {
    statuses: Arc<Mutex<HashMap<String, TaskStatus>>>,
}

impl TokioTaskQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_statuses<T>(&self, f: impl FnOnce(&mut HashMap<String, TaskStatus>) -> T) -> T {
        let mut guard = self
            .statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

fn run_task(task_name: &str, payload: &serde_json::Value) -> std::result::Result<(), String> {
    match task_name {
        "send_order_confirmation" => {
            tracing::info!(payload = %payload, "dispatching order confirmation");
            Ok(())
        }
        "process_order" => {
            tracing::info!(payload = %payload, "processing order");
            Ok(())
        }
        other => Err(format!("unknown task '{other}'")),
    }
}

impl TaskQueue for TokioTaskQueue {
    async fn submit(&self, task_name: &str, payload: serde_json::Value) -> Result<TaskHandle> {
        let handle = TaskHandle(format!("task-{}", Uuid::new_v4().simple()));
        self.with_statuses(|statuses| {
            statuses.insert(
                handle.0.clone(),
                TaskStatus {
                    handle: handle.clone(),
                    state: TaskState::Queued,
                    result: None,
                    error: None,
                },
            );
        });

        let queue = self.clone();
        let task_name = task_name.to_string();
        let task_handle = handle.clone();
        tokio::spawn(async move {
            queue.with_statuses(|statuses| {
                if let Some(status) = statuses.get_mut(&task_handle.0) {
                    status.state = TaskState::Running;
                }
            });
            let outcome = run_task(&task_name, &payload);
            queue.with_statuses(|statuses| {
                if let Some(status) = statuses.get_mut(&task_handle.0) {
                    match outcome {
                        Ok(()) => {
                            status.state = TaskState::Completed;
                            status.result = Some(json!({ "handled": true }));
                        }
                        Err(error) => {
                            tracing::warn!(task = %task_name, %error, "task failed");
                            status.state = TaskState::Failed;
                            status.error = Some(error);
                        }
                    }
                }
            });
        });

        Ok(handle)
    }

    async fn status(&self, handle: &TaskHandle) -> Result<TaskStatus> {
        self.with_statuses(|statuses| {
            statuses
                .get(&handle.0)
                .cloned()
                .ok_or(tomeshop_core::ShopError::NotFound { resource: "task" })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_tasks_run_to_completion() {
        let queue = TokioTaskQueue::new();
        let handle = queue
            .submit("send_order_confirmation", json!({"reference": "ord-1"}))
            .await
            .unwrap();
        tokio::task::yield_now().await;
        let status = queue.status(&handle).await.unwrap();
        assert!(matches!(
            status.state,
            TaskState::Queued | TaskState::Running | TaskState::Completed
        ));
    }

    #[tokio::test]
    async fn unknown_tasks_are_marked_failed() {
        let queue = TokioTaskQueue::new();
        let handle = queue.submit("mint_gold", json!({})).await.unwrap();
        // The spawned task holds no awaits, so one yield lets it finish.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let status = queue.status(&handle).await.unwrap();
        assert_eq!(status.state, TaskState::Failed);
        assert!(status.error.unwrap().contains("mint_gold"));
    }

    #[tokio::test]
    async fn unknown_handles_are_not_found() {
        let queue = TokioTaskQueue::new();
        let missing = TaskHandle("task-missing".to_string());
        assert!(queue.status(&missing).await.is_err());
    }
}
