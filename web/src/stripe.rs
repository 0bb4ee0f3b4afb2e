//! Stripe payment processor client.
//!
//! Implements both directions of the processor boundary: the outbound
//! payment-intent creation call (form-encoded REST with an idempotency key
//! and a bounded timeout) and the inbound webhook signature check
//! (HMAC-SHA256 over `"{timestamp}.{payload}"`, compared in constant time
//! against every `v1` candidate in the header).

use chrono::Utc;
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use tomeshop_core::error::{Result, ShopError};
use tomeshop_core::providers::{CreateIntentRequest, PaymentProcessor, ProcessorIntent};

type HmacSha256 = Hmac<Sha256>;

/// Stripe client configuration.
#[derive(Clone, Debug)]
pub struct StripeConfig {
    /// Secret API key for outbound calls.
    pub api_key: String,
    /// Webhook signing secret shared with the processor.
    pub webhook_secret: String,
    /// API base URL. Overridable for tests against a local stub.
    pub api_base: String,
    /// Bound on the intent-creation call.
    pub timeout: Duration,
    /// Maximum accepted age of a webhook signature timestamp.
    pub signature_tolerance: Duration,
}

impl StripeConfig {
    /// Configuration against the live API with default timing.
    #[must_use]
    pub fn new(api_key: String, webhook_secret: String) -> Self {
        Self {
            api_key,
            webhook_secret,
            api_base: "https://api.stripe.com".to_string(),
            timeout: Duration::from_secs(10),
            signature_tolerance: Duration::from_secs(300),
        }
    }
}

/// Stripe payment processor client.
#[derive(Clone, Debug)]
pub struct StripeClient {
    http: reqwest::Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: String,
    status: String,
    #[serde(default)]
    metadata: serde_json::Value,
}

impl StripeClient {
    /// Create a client for the configured account.
    #[must_use]
    pub fn new(config: StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

impl PaymentProcessor for StripeClient {
    async fn create_intent(&self, request: &CreateIntentRequest) -> Result<ProcessorIntent> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount.cents().to_string()),
            ("currency".to_string(), request.currency.clone()),
        ];
        if let Some(metadata) = request.metadata.as_object() {
            for (key, value) in metadata {
                let value = value
                    .as_str()
                    .map_or_else(|| value.to_string(), str::to_string);
                form.push((format!("metadata[{key}]"), value));
            }
        }

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .timeout(self.config.timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| ShopError::external(format!("payment intent creation: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShopError::external(format!(
                "payment intent creation returned {status}: {body}"
            )));
        }

        let intent: IntentResponse = response
            .json()
            .await
            .map_err(|e| ShopError::external(format!("payment intent decoding: {e}")))?;
        Ok(ProcessorIntent {
            transaction_id: intent.id,
            client_secret: intent.client_secret,
            status: intent.status,
            metadata: intent.metadata,
        })
    }

    fn verify_signature(&self, payload: &[u8], signature_header: &str) -> Result<()> {
        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<&str> = Vec::new();
        for part in signature_header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                return Err(ShopError::InvalidSignature);
            };
            match key {
                "t" => timestamp = value.parse().ok(),
                "v1" => candidates.push(value),
                // Other schemes (v0) are ignored.
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(ShopError::InvalidSignature)?;
        if candidates.is_empty() {
            return Err(ShopError::InvalidSignature);
        }

        let tolerance =
            i64::try_from(self.config.signature_tolerance.as_secs()).unwrap_or(i64::MAX);
        if (Utc::now().timestamp() - timestamp).abs() > tolerance {
            return Err(ShopError::InvalidSignature);
        }

        let expected = signature_header_value(&self.config.webhook_secret, timestamp, payload);
        let expected = expected
            .split_once("v1=")
            .map(|(_, sig)| sig)
            .ok_or(ShopError::InvalidSignature)?;
        if candidates
            .iter()
            .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()))
        {
            Ok(())
        } else {
            Err(ShopError::InvalidSignature)
        }
    }
}

/// Build a complete `t=…,v1=…` signature header for a payload.
///
/// Used by tests and local tooling to produce deliveries the verifier
/// accepts.
#[must_use]
pub fn signature_header_value(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    // HMAC accepts keys of any length, so new_from_slice cannot fail; the
    // fallback keeps the function total without panicking paths.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| HmacSha256::new(&Default::default()));
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn client() -> StripeClient {
        StripeClient::new(StripeConfig::new(
            "sk_test_key".to_string(),
            "whsec_secret".to_string(),
        ))
    }

    #[test]
    fn accepts_a_fresh_valid_signature() {
        let client = client();
        let payload = br#"{"id":"evt_1"}"#;
        let header = signature_header_value("whsec_secret", Utc::now().timestamp(), payload);
        assert!(client.verify_signature(payload, &header).is_ok());
    }

    #[test]
    fn rejects_a_wrong_secret() {
        let client = client();
        let payload = br#"{"id":"evt_1"}"#;
        let header = signature_header_value("whsec_other", Utc::now().timestamp(), payload);
        assert!(client.verify_signature(payload, &header).is_err());
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let client = client();
        let payload = br#"{"id":"evt_1"}"#;
        let stale = Utc::now().timestamp() - 3600;
        let header = signature_header_value("whsec_secret", stale, payload);
        assert!(client.verify_signature(payload, &header).is_err());
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let client = client();
        let header =
            signature_header_value("whsec_secret", Utc::now().timestamp(), br#"{"id":"evt_1"}"#);
        assert!(
            client
                .verify_signature(br#"{"id":"evt_2"}"#, &header)
                .is_err()
        );
    }

    #[test]
    fn rejects_malformed_headers() {
        let client = client();
        for header in ["", "t=notanumber,v1=aa", "v1=aa", "t=123", "garbage"] {
            assert!(client.verify_signature(b"{}", header).is_err(), "{header}");
        }
    }
}
