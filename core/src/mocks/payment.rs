//! Mock payment processor, for tests.

use crate::error::{Result, ShopError};
use crate::providers::{CreateIntentRequest, PaymentProcessor, ProcessorIntent};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Inner {
    intents: Vec<(CreateIntentRequest, ProcessorIntent)>,
    fail_next: bool,
}

/// In-memory [`PaymentProcessor`].
///
/// Signature verification accepts exactly one header value, the configured
/// secret. Intent creation honors idempotency keys: a repeated key returns
/// the intent minted for its first request.
#[derive(Clone, Debug)]
pub struct MockPaymentProcessor {
    secret: String,
    inner: Arc<Mutex<Inner>>,
}

impl MockPaymentProcessor {
    /// Create a processor that accepts `secret` as the signature header.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// The signature header value [`PaymentProcessor::verify_signature`]
    /// accepts.
    #[must_use]
    pub fn valid_signature(&self) -> &str {
        &self.secret
    }

    /// Make the next `create_intent` call fail with an external error.
    pub fn fail_next_create(&self) {
        super::lock(&self.inner).fail_next = true;
    }

    /// Every creation request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<CreateIntentRequest> {
        super::lock(&self.inner)
            .intents
            .iter()
            .map(|(req, _)| req.clone())
            .collect()
    }
}

impl Default for MockPaymentProcessor {
    fn default() -> Self {
        Self::new("whsec_test")
    }
}

impl PaymentProcessor for MockPaymentProcessor {
    async fn create_intent(&self, request: &CreateIntentRequest) -> Result<ProcessorIntent> {
        let mut inner = super::lock(&self.inner);
        if inner.fail_next {
            inner.fail_next = false;
            return Err(ShopError::external("processor unavailable"));
        }
        if let Some((_, intent)) = inner
            .intents
            .iter()
            .find(|(req, _)| req.idempotency_key == request.idempotency_key)
        {
            return Ok(intent.clone());
        }
        let n = inner.intents.len() + 1;
        let intent = ProcessorIntent {
            transaction_id: format!("pi_mock_{n}"),
            client_secret: format!("pi_mock_{n}_secret"),
            status: "requires_payment_method".to_string(),
            metadata: request.metadata.clone(),
        };
        inner.intents.push((request.clone(), intent.clone()));
        Ok(intent)
    }

    fn verify_signature(&self, _payload: &[u8], signature_header: &str) -> Result<()> {
        if signature_header == self.secret {
            Ok(())
        } else {
            Err(ShopError::InvalidSignature)
        }
    }
}
