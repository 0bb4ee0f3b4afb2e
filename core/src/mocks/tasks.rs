//! Mock task queue, for tests.

use crate::error::{Result, ShopError};
use crate::providers::{TaskHandle, TaskQueue, TaskState, TaskStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Inner {
    tasks: HashMap<TaskHandle, (String, serde_json::Value, TaskStatus)>,
    counter: usize,
}

/// In-memory [`TaskQueue`] that records submissions without executing them.
///
/// Tasks stay `Queued` until a test drives them with [`complete`] or
/// [`fail`].
///
/// [`complete`]: MockTaskQueue::complete
/// [`fail`]: MockTaskQueue::fail
#[derive(Clone, Debug, Default)]
pub struct MockTaskQueue {
    inner: Arc<Mutex<Inner>>,
}

impl MockTaskQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(task_name, payload)` submitted so far, in order of handle.
    #[must_use]
    pub fn submitted(&self) -> Vec<(String, serde_json::Value)> {
        let inner = super::lock(&self.inner);
        let mut entries: Vec<_> = inner.tasks.iter().collect();
        entries.sort_by(|a, b| a.0.0.cmp(&b.0.0));
        entries
            .into_iter()
            .map(|(_, (name, payload, _))| (name.clone(), payload.clone()))
            .collect()
    }

    /// Mark a task completed with a result payload.
    pub fn complete(&self, handle: &TaskHandle, result: serde_json::Value) {
        if let Some((_, _, status)) = super::lock(&self.inner).tasks.get_mut(handle) {
            status.state = TaskState::Completed;
            status.result = Some(result);
        }
    }

    /// Mark a task failed with an error description.
    pub fn fail(&self, handle: &TaskHandle, error: impl Into<String>) {
        if let Some((_, _, status)) = super::lock(&self.inner).tasks.get_mut(handle) {
            status.state = TaskState::Failed;
            status.error = Some(error.into());
        }
    }
}

impl TaskQueue for MockTaskQueue {
    async fn submit(&self, task_name: &str, payload: serde_json::Value) -> Result<TaskHandle> {
        let mut inner = super::lock(&self.inner);
        inner.counter += 1;
        let handle = TaskHandle(format!("task-{:04}", inner.counter));
        let status = TaskStatus {
            handle: handle.clone(),
            state: TaskState::Queued,
            result: None,
            error: None,
        };
        inner
            .tasks
            .insert(handle.clone(), (task_name.to_string(), payload, status));
        Ok(handle)
    }

    async fn status(&self, handle: &TaskHandle) -> Result<TaskStatus> {
        super::lock(&self.inner)
            .tasks
            .get(handle)
            .map(|(_, _, status)| status.clone())
            .ok_or(ShopError::NotFound { resource: "task" })
    }
}
