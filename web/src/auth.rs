//! Bearer-token verification against an external identity service.

use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tomeshop_core::UserId;
use tomeshop_core::error::{Result, ShopError};
use tomeshop_core::providers::TokenVerifier;

/// Token verifier backed by an HTTP introspection endpoint.
///
/// Posts the presented token to the identity service and maps the answer
/// into the domain: a successful introspection yields the [`UserId`], a
/// rejection becomes `NotFound` (the middleware turns that into 401), and
/// transport failures surface as retryable external-service errors.
#[derive(Clone, Debug)]
pub struct HttpTokenVerifier {
    http: reqwest::Client,
    introspection_url: String,
    timeout: Duration,
}

#[derive(Debug, serde::Serialize)]
struct IntrospectionRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    user_id: UserId,
}

impl HttpTokenVerifier {
    /// Create a verifier for the given introspection endpoint.
    #[must_use]
    pub fn new(introspection_url: String, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            introspection_url,
            timeout,
        }
    }
}

impl TokenVerifier for HttpTokenVerifier {
    async fn verify(&self, token: &str) -> Result<UserId> {
        let response = self
            .http
            .post(&self.introspection_url)
            .timeout(self.timeout)
            .json(&IntrospectionRequest { token })
            .send()
            .await
            .map_err(|e| ShopError::external(format!("token introspection: {e}")))?;

        match response.status() {
            status if status.is_success() => {
                let body: IntrospectionResponse = response
                    .json()
                    .await
                    .map_err(|e| ShopError::external(format!("token introspection body: {e}")))?;
                Ok(body.user_id)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Err(ShopError::NotFound { resource: "token" })
            }
            status => Err(ShopError::external(format!(
                "token introspection returned {status}"
            ))),
        }
    }
}
