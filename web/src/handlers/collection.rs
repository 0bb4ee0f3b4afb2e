//! Owned-volume collection endpoint.

use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::state::AppState;
use axum::{Json, extract::State};
use tomeshop_core::providers::{
    CatalogProvider, Notifier, PaymentProcessor, TaskQueue, TokenVerifier,
};
use tomeshop_core::store::ShopStore;
use tomeshop_core::types::OwnedVolume;

/// `GET /api/collection`
pub async fn list<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<OwnedVolume>>, AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    Ok(Json(state.env.collection(user).await?))
}
