//! Background task endpoints: submission and status polling.

use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tomeshop_core::OrderReference;
use tomeshop_core::providers::{
    CatalogProvider, Notifier, PaymentProcessor, TaskHandle, TaskQueue, TaskStatus, TokenVerifier,
};
use tomeshop_core::store::ShopStore;

/// Body of `POST /api/tasks/process-order`.
#[derive(Debug, Deserialize)]
pub struct ProcessOrderRequest {
    /// Order to process.
    pub reference: OrderReference,
}

/// `POST /api/tasks/process-order`
///
/// The order must belong to the caller; the check happens before the task
/// is queued so an attacker cannot probe foreign references.
pub async fn process_order<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    AuthUser(user): AuthUser,
    Json(body): Json<ProcessOrderRequest>,
) -> Result<(StatusCode, Json<TaskHandle>), AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    let detail = state.env.order_detail(user, body.reference).await?;
    let handle = state
        .env
        .tasks
        .submit(
            "process_order",
            json!({
                "reference": detail.order.reference,
                "user_id": user,
            }),
        )
        .await?;
    Ok((StatusCode::ACCEPTED, Json(handle)))
}

/// `GET /api/tasks/:task_id`
pub async fn status<S, C, P, N, Q, V>(
    State(state): State<AppState<S, C, P, N, Q, V>>,
    AuthUser(_user): AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatus>, AppError>
where
    S: ShopStore + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProcessor + 'static,
    N: Notifier + 'static,
    Q: TaskQueue + 'static,
    V: TokenVerifier + 'static,
{
    let status = state.env.tasks.status(&TaskHandle(task_id)).await?;
    Ok(Json(status))
}
