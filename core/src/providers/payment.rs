//! Payment processor collaborator trait.

use super::{CreateIntentRequest, ProcessorIntent};
use crate::error::Result;

/// The payment processor boundary.
///
/// Covers both directions of the contract: the outbound transaction
/// creation call and the signature check for inbound webhook deliveries.
pub trait PaymentProcessor: Send + Sync {
    /// Create a transaction on the processor side.
    ///
    /// Implementations must bound the call with a timeout and must not
    /// retry on their own; the idempotency key in the request is what makes
    /// a caller-level retry safe.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::ExternalService` if the call fails or times out.
    /// No local state may have been written when this errors.
    fn create_intent(
        &self,
        request: &CreateIntentRequest,
    ) -> impl std::future::Future<Output = Result<ProcessorIntent>> + Send;

    /// Verify the signature header of an inbound webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::InvalidSignature` if the header is malformed,
    /// the timestamp is outside tolerance, or no signature matches.
    fn verify_signature(&self, payload: &[u8], signature_header: &str) -> Result<()>;
}
