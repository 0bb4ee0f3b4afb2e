//! Notification collaborator trait.

use super::TaskQueue;
use crate::error::Result;
use crate::types::OrderReceipt;

/// Notification channel fired when an order reaches PAID.
///
/// Notification content and delivery are out of scope here; the core only
/// triggers the side effect at the exact state transition, never through a
/// generic persistence hook.
pub trait Notifier: Send + Sync {
    /// Notify that an order has been paid.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::ExternalService` if the notification could not
    /// be handed off. The reconciler logs and swallows this: a lost
    /// notification must never fail webhook acknowledgment.
    fn order_paid(
        &self,
        receipt: &OrderReceipt,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Notifier that hands the receipt to the task queue as a
/// `send_order_confirmation` task.
#[derive(Clone, Debug)]
pub struct TaskQueueNotifier<Q> {
    queue: Q,
}

impl<Q> TaskQueueNotifier<Q> {
    /// Wrap a task queue.
    pub const fn new(queue: Q) -> Self {
        Self { queue }
    }
}

impl<Q: TaskQueue> Notifier for TaskQueueNotifier<Q> {
    async fn order_paid(&self, receipt: &OrderReceipt) -> Result<()> {
        let payload = serde_json::to_value(receipt)
            .map_err(|e| crate::error::ShopError::external(format!("receipt encoding: {e}")))?;
        let handle = self.queue.submit("send_order_confirmation", payload).await?;
        tracing::debug!(task = %handle, reference = %receipt.reference, "order confirmation queued");
        Ok(())
    }
}
