//! Payment endpoints: intent creation and status lookup.

use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tomeshop_core::OrderReference;
use tomeshop_core::providers::{
    CatalogProvider, Notifier, PaymentProcessor, TaskQueue, TokenVerifier,
};
use tomeshop_core::store::ShopStore;
use tomeshop_core::types::Payment;

/// `POST /api/orders/:reference/payment-intent`
///
/// Bridges the order to the payment processor. The response carries the
/// client secret the payer's SDK needs; the server never sees card data.
pub async fn create_intent<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    AuthUser(user): AuthUser,
    Path(reference): Path<OrderReference>,
) -> Result<(StatusCode, Json<Payment>), AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    let payment = state.env.create_payment_intent(user, reference).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// `GET /api/payments/:lookup/status`
///
/// `lookup` is either the local payment id or the processor transaction id.
pub async fn status<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    AuthUser(user): AuthUser,
    Path(lookup): Path<String>,
) -> Result<Json<Payment>, AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    Ok(Json(state.env.payment_status(user, &lookup).await?))
}
