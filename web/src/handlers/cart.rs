//! Cart endpoints.

use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tomeshop_core::VolumeId;
use tomeshop_core::providers::{
    CatalogProvider, Notifier, PaymentProcessor, TaskQueue, TokenVerifier,
};
use tomeshop_core::store::ShopStore;
use tomeshop_core::types::CartView;

/// Body of `POST /api/cart/items`.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    /// Volume to add.
    pub volume_id: VolumeId,
    /// Units to add; defaults to one.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

/// Body of `PUT /api/cart/items/:volume_id`.
#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    /// New line quantity; zero or negative removes the line.
    pub quantity: i64,
}

/// `GET /api/cart`
pub async fn view<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    AuthUser(user): AuthUser,
) -> Result<Json<CartView>, AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    Ok(Json(state.env.cart(user).await?))
}

/// `POST /api/cart/items`
pub async fn add_item<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    AuthUser(user): AuthUser,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartView>, AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    let cart = state
        .env
        .add_to_cart(user, body.volume_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// `PUT /api/cart/items/:volume_id`
pub async fn set_quantity<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    AuthUser(user): AuthUser,
    Path(volume_id): Path<VolumeId>,
    Json(body): Json<SetQuantityRequest>,
) -> Result<Json<CartView>, AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    let cart = state
        .env
        .set_cart_quantity(user, volume_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// `DELETE /api/cart/items/:volume_id`
pub async fn remove_item<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    AuthUser(user): AuthUser,
    Path(volume_id): Path<VolumeId>,
) -> Result<Json<CartView>, AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    Ok(Json(state.env.remove_from_cart(user, volume_id).await?))
}

/// `DELETE /api/cart`
pub async fn clear<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    AuthUser(user): AuthUser,
) -> Result<StatusCode, AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    state.env.clear_cart(user).await?;
    Ok(StatusCode::NO_CONTENT)
}
