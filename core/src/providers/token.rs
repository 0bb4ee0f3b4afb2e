//! Auth token verifier collaborator trait.

use crate::error::Result;
use crate::types::UserId;

/// Bearer credential verification.
///
/// Token issuance and account management live in an external auth service.
/// The storefront only ever asks one question: which user does this bearer
/// token belong to? The web layer calls this from middleware so that
/// handlers receive an authenticated identity and nothing else.
pub trait TokenVerifier: Send + Sync {
    /// Resolve a bearer token to a user identity.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an invalid or expired token and
    /// `ShopError::ExternalService` if the verifier itself is unreachable.
    fn verify(&self, token: &str) -> impl std::future::Future<Output = Result<UserId>> + Send;
}
