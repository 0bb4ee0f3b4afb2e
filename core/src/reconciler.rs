//! Webhook reconciler: the only writer of payment outcomes.
//!
//! Client-side confirmation is never trusted; a payment becomes real only
//! when the processor says so over this channel. Deliveries are at-least-once
//! and unordered, so every step here is built to be replayed: the ledger
//! dedups by processor event id, and application of a success event is a
//! single atomic transaction that can run twice without double-granting.
//!
//! Processing order is fixed: verify the signature, record the event in the
//! ledger, apply side effects, then mark the event processed. A crash between
//! the last two steps leaves the event `seen but unprocessed`, which the next
//! redelivery repairs.

use crate::environment::ShopEnvironment;
use crate::error::{Result, ShopError};
use crate::providers::{CatalogProvider, Notifier, PaymentProcessor, TaskQueue};
use crate::store::{EventDisposition, ShopStore};
use crate::types::PaymentStatus;
use serde::Deserialize;

/// What handling a webhook delivery amounted to.
///
/// Every variant is an acknowledgment; the processor must not redeliver any
/// of these. Only signature and infrastructure failures surface as errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Payment success applied: order paid, ownership granted, cart cleared.
    Applied,
    /// Payment failure recorded; the order remains PENDING and payable.
    FailureRecorded,
    /// A pass-through status was mirrored onto the payment.
    StatusMirrored(PaymentStatus),
    /// Recognized event shape, but no local payment matches its transaction
    /// id. Recorded for investigation and acknowledged.
    Unmatched,
    /// Event type this core does not react to. Recorded and acknowledged.
    Ignored,
    /// Ledger says this event was already fully processed.
    Duplicate,
}

/// Wire shape of a processor event, reduced to what dispatch needs.
#[derive(Debug, Deserialize)]
struct EventEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: EventObject,
}

#[derive(Debug, Deserialize)]
struct EventObject {
    id: String,
}

impl<S, C, P, N, Q> ShopEnvironment<S, C, P, N, Q>
where
    S: ShopStore,
    C: CatalogProvider,
    P: PaymentProcessor,
    N: Notifier,
    Q: TaskQueue,
{
    /// Handle one webhook delivery.
    ///
    /// # Errors
    ///
    /// - [`ShopError::InvalidSignature`] before any state is written;
    /// - [`ShopError::Validation`] for an authentic but malformed payload;
    /// - [`ShopError::Database`] when the ledger or application transaction
    ///   fails, in which case nothing was acknowledged and the processor
    ///   will redeliver.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookOutcome> {
        // Authenticity first. An unverified payload must leave no trace.
        self.processor.verify_signature(payload, signature_header)?;

        let envelope: EventEnvelope = serde_json::from_slice(payload)
            .map_err(|e| ShopError::validation(format!("malformed event payload: {e}")))?;
        let raw: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| ShopError::validation(format!("malformed event payload: {e}")))?;

        let disposition = self
            .store
            .record_webhook_event(&envelope.id, &envelope.event_type, raw)
            .await?;
        if disposition == EventDisposition::AlreadyProcessed {
            tracing::debug!(event_id = %envelope.id, "duplicate webhook delivery");
            metrics::counter!("tomeshop_webhook_events_total", "outcome" => "duplicate")
                .increment(1);
            return Ok(WebhookOutcome::Duplicate);
        }

        let outcome = self.dispatch(&envelope).await?;
        self.store.mark_event_processed(&envelope.id).await?;

        let label = match &outcome {
            WebhookOutcome::Applied => "applied",
            WebhookOutcome::FailureRecorded => "failure_recorded",
            WebhookOutcome::StatusMirrored(_) => "status_mirrored",
            WebhookOutcome::Unmatched => "unmatched",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::Duplicate => "duplicate",
        };
        metrics::counter!("tomeshop_webhook_events_total", "outcome" => label).increment(1);
        Ok(outcome)
    }

    async fn dispatch(&self, envelope: &EventEnvelope) -> Result<WebhookOutcome> {
        let transaction_id = envelope.data.object.id.as_str();
        match envelope.event_type.as_str() {
            "payment_intent.succeeded" => {
                let Some(settlement) = self.store.apply_payment_success(transaction_id).await?
                else {
                    tracing::warn!(
                        event_id = %envelope.id,
                        transaction_id,
                        "success event for unknown transaction"
                    );
                    return Ok(WebhookOutcome::Unmatched);
                };
                tracing::info!(
                    reference = %settlement.receipt.reference,
                    transaction_id,
                    transitioned = settlement.order_transitioned,
                    "payment success applied"
                );
                // Notify only on the actual PENDING → PAID edge, never on an
                // idempotent re-application. A lost notification must not
                // fail the acknowledgment, so errors are logged and dropped.
                if settlement.order_transitioned {
                    if let Err(error) = self.notifier.order_paid(&settlement.receipt).await {
                        tracing::error!(
                            reference = %settlement.receipt.reference,
                            %error,
                            "order-paid notification failed"
                        );
                    }
                }
                Ok(WebhookOutcome::Applied)
            }
            "payment_intent.payment_failed" => {
                if self.store.apply_payment_failure(transaction_id).await? {
                    tracing::info!(transaction_id, "payment failure recorded");
                    Ok(WebhookOutcome::FailureRecorded)
                } else {
                    tracing::warn!(
                        event_id = %envelope.id,
                        transaction_id,
                        "failure event for unknown transaction"
                    );
                    Ok(WebhookOutcome::Unmatched)
                }
            }
            "payment_intent.requires_action" | "payment_intent.canceled" => {
                let status = if envelope.event_type.ends_with("requires_action") {
                    PaymentStatus::RequiresAction
                } else {
                    PaymentStatus::Cancelled
                };
                if self
                    .store
                    .mirror_payment_status(transaction_id, status)
                    .await?
                {
                    Ok(WebhookOutcome::StatusMirrored(status))
                } else {
                    Ok(WebhookOutcome::Unmatched)
                }
            }
            other => {
                tracing::debug!(event_id = %envelope.id, event_type = other, "event type ignored");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_processor_shape() {
        let payload = serde_json::json!({
            "id": "evt_123",
            "type": "payment_intent.succeeded",
            "api_version": "2024-06-20",
            "data": { "object": { "id": "pi_456", "status": "succeeded" } }
        });
        let envelope: EventEnvelope = serde_json::from_value(payload).unwrap();
        assert_eq!(envelope.id, "evt_123");
        assert_eq!(envelope.event_type, "payment_intent.succeeded");
        assert_eq!(envelope.data.object.id, "pi_456");
    }

    #[test]
    fn envelope_rejects_missing_object_id() {
        let payload = serde_json::json!({
            "id": "evt_123",
            "type": "payment_intent.succeeded",
            "data": { "object": {} }
        });
        assert!(serde_json::from_value::<EventEnvelope>(payload).is_err());
    }
}
