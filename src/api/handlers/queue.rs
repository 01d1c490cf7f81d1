//! Retry queue introspection and maintenance endpoints.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::doc::QUEUE_TAG;
use crate::api::dto::ErrorResponse;
use crate::error::EngineResult;
use crate::queue::QueueStats;
use crate::state::EngineState;

pub fn routes() -> OpenApiRouter<EngineState> {
    OpenApiRouter::new()
        .routes(routes!(queue_stats))
        .routes(routes!(retry_failed))
}

/// Returns counts for the in-memory tier and the durable backlog.
#[utoipa::path(
    get,
    path = "/queue/stats",
    responses(
        (status = 200, description = "Queue statistics", body = QueueStats),
        (status = 500, description = "Database error", body = ErrorResponse),
    ),
    tag = QUEUE_TAG
)]
pub async fn queue_stats(State(state): State<EngineState>) -> EngineResult<Json<QueueStats>> {
    let stats = state.queue.stats().await?;
    Ok(Json(stats))
}

/// Outcome of a retry-failed sweep
#[derive(Debug, Serialize, ToSchema)]
pub struct RetryFailedResponse {
    /// Failed notifications returned to pending
    pub reset: u64,
}

/// Returns unexpired failed notifications to the retry queue.
///
/// Each reset row becomes pending with a fresh attempt budget and an
/// immediate retry time, so the next drain pass picks it up.
#[utoipa::path(
    post,
    path = "/queue/retry-failed",
    responses(
        (status = 200, description = "Failed notifications reset", body = RetryFailedResponse),
        (status = 500, description = "Database error", body = ErrorResponse),
    ),
    tag = QUEUE_TAG
)]
pub async fn retry_failed(
    State(state): State<EngineState>,
) -> EngineResult<Json<RetryFailedResponse>> {
    let reset = state.queue.retry_failed(Utc::now().naive_utc()).await?;
    Ok(Json(RetryFailedResponse { reset }))
}
