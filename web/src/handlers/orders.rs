//! Order endpoints: commit, history, detail.

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
use tomeshop_core::types::OrderDetail;

/// `POST /api/orders`
///
/// Commits the current cart into an immutable order snapshot.
pub async fn commit<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    AuthUser(user): AuthUser,
) -> Result<(StatusCode, Json<OrderDetail>), AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    let detail = state.env.commit_order(user).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// `GET /api/orders`
pub async fn history<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<OrderDetail>>, AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    Ok(Json(state.env.order_history(user).await?))
}

/// `GET /api/orders/:reference`
pub async fn detail<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    AuthUser(user): AuthUser,
    Path(reference): Path<OrderReference>,
) -> Result<Json<OrderDetail>, AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    Ok(Json(state.env.order_detail(user, reference).await?))
}
