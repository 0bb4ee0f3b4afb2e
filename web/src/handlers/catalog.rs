//! Catalog maintenance endpoints.

use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tomeshop_core::SeriesId;
use tomeshop_core::providers::{
    CatalogProvider, Notifier, PaymentProcessor, TaskQueue, TokenVerifier, VolumeReconciliation,
};
use tomeshop_core::store::ShopStore;

/// Body of `POST /api/catalog/series/:series_id/reconcile`.
#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    /// Volume count the series should have after reconciliation.
    pub declared_count: u32,
}

/// `POST /api/catalog/series/:series_id/reconcile`
///
/// Creates missing volumes up to the declared count and prunes surplus ones
/// above it. Invoked explicitly after a catalog edit rather than hidden in a
/// persistence hook.
pub async fn reconcile<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    AuthUser(_user): AuthUser,
    Path(series_id): Path<SeriesId>,
    Json(body): Json<ReconcileRequest>,
) -> Result<Json<VolumeReconciliation>, AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    let report = state
        .env
        .catalog
        .reconcile_volume_count(series_id, body.declared_count)
        .await?;
    Ok(Json(report))
}
