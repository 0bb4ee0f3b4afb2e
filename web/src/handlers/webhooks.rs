//! Inbound payment-processor webhook endpoint.
//!
//! Every domain outcome is a 200 acknowledgment so the processor stops
//! redelivering; only signature failures, malformed payloads and
//! infrastructure errors surface as non-2xx and trigger redelivery.

use crate::error::AppError;
use crate::extractors::CorrelationId;
use crate::state::AppState;
use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use serde_json::{Value, json};
use tomeshop_core::WebhookOutcome;
use tomeshop_core::providers::{
    CatalogProvider, Notifier, PaymentProcessor, TaskQueue, TokenVerifier,
};
use tomeshop_core::store::ShopStore;

/// Signature header set by the processor on every delivery.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

fn outcome_label(outcome: &WebhookOutcome) -> &'static str {
    match outcome {
        WebhookOutcome::Applied => "applied",
        WebhookOutcome::FailureRecorded => "failure_recorded",
        WebhookOutcome::StatusMirrored(_) => "status_mirrored",
        WebhookOutcome::Unmatched => "unmatched",
        WebhookOutcome::Ignored => "ignored",
        WebhookOutcome::Duplicate => "duplicate",
    }
}

/// `POST /api/webhooks/payment`
///
/// The raw body bytes are verified against the signature header before any
/// parsing; the signed payload must reach the verifier untouched.
pub async fn payment<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    CorrelationId(correlation_id): CorrelationId,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::bad_request("missing signature header"))?;

    let outcome = state.env.handle_webhook(&body, signature).await?;
    tracing::info!(
        %correlation_id,
        outcome = outcome_label(&outcome),
        "webhook delivery handled"
    );
    Ok(Json(json!({
        "received": true,
        "outcome": outcome_label(&outcome),
    })))
}
