//! Axum middleware: correlation tracking and bearer authentication.
//!
//! The correlation layer tags every request with an `X-Correlation-ID`
//! (extracted or generated), wraps the request in a tracing span carrying
//! it, and echoes it back in the response.
//!
//! The bearer middleware resolves `Authorization: Bearer <token>` through
//! the token verifier and stores the resulting [`UserId`] in request
//! extensions; handlers then extract [`crate::extractors::AuthUser`] and
//! never see the credential itself.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::task::{Context, Poll};
use tomeshop_core::UserId;
use tomeshop_core::providers::{
    CatalogProvider, Notifier, PaymentProcessor, TaskQueue, TokenVerifier,
};
use tomeshop_core::store::ShopStore;
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Create a layer that adds correlation ID tracking to all requests.
#[must_use]
pub fn correlation_id_layer() -> CorrelationIdLayer {
    CorrelationIdLayer
}

/// Layer for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdLayer;

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdMiddleware { inner }
    }
}

/// Middleware service for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for CorrelationIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let correlation_id = req
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        req.extensions_mut().insert(correlation_id);

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %req.method(),
            uri = %req.uri(),
        );

        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.instrument(span).await?;

            if let Ok(header_value) = HeaderValue::from_str(&correlation_id.to_string()) {
                response
                    .headers_mut()
                    .insert(CORRELATION_ID_HEADER, header_value);
            }

            Ok(response)
        })
    }
}

/// Bearer authentication middleware for `axum::middleware::from_fn_with_state`.
///
/// # Errors
///
/// Rejects with 401 when the `Authorization` header is missing or malformed
/// or the verifier does not recognize the token, and with 502 when the
/// verifier itself is unreachable.
pub async fn require_bearer<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("missing bearer token"))?
        .to_string();

    let user_id: UserId = state.verifier.verify(&token).await.map_err(|error| {
        if error.is_retryable() {
            AppError::from(error)
        } else {
            AppError::unauthorized("invalid bearer token")
        }
    })?;

    request.extensions_mut().insert(user_id);
    Ok(next.run(request).await)
}
