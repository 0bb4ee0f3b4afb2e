//! Mock token verifier, for tests.

use crate::error::{Result, ShopError};
use crate::providers::TokenVerifier;
use crate::types::UserId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory [`TokenVerifier`] with test-issued tokens.
#[derive(Clone, Debug, Default)]
pub struct MockTokenVerifier {
    tokens: Arc<Mutex<HashMap<String, UserId>>>,
}

impl MockTokenVerifier {
    /// Create a verifier that knows no tokens.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a bearer token for a user and return it.
    #[must_use]
    pub fn issue(&self, user_id: UserId) -> String {
        let token = format!("tok_{}", uuid::Uuid::new_v4().simple());
        super::lock(&self.tokens).insert(token.clone(), user_id);
        token
    }
}

impl TokenVerifier for MockTokenVerifier {
    async fn verify(&self, token: &str) -> Result<UserId> {
        super::lock(&self.tokens)
            .get(token)
            .copied()
            .ok_or(ShopError::NotFound { resource: "token" })
    }
}
