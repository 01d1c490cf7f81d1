//! User connectivity endpoints.
//!
//! Marking a user online also drains their queued backlog, so a client
//! reconnecting gets its pending notifications pushed straight away.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::doc::CONNECTIVITY_TAG;
use crate::api::dto::{ConnectivityResponse, ErrorResponse, MarkOnlineRequest};
use crate::error::EngineResult;
use crate::state::EngineState;
use crate::utils::ValidatedJson;

pub fn routes() -> OpenApiRouter<EngineState> {
    OpenApiRouter::new()
        .routes(routes!(mark_online))
        .routes(routes!(mark_offline))
}

/// Marks a user as online and flushes their queued backlog.
#[utoipa::path(
    post,
    path = "/connectivity/{user_id}/online",
    params(
        ("user_id" = i64, Path, description = "User to mark online")
    ),
    request_body = MarkOnlineRequest,
    responses(
        (status = 200, description = "User marked online", body = ConnectivityResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    ),
    tag = CONNECTIVITY_TAG
)]
pub async fn mark_online(
    State(state): State<EngineState>,
    Path(user_id): Path<i64>,
    ValidatedJson(dto): ValidatedJson<MarkOnlineRequest>,
) -> EngineResult<Json<ConnectivityResponse>> {
    state.connectivity.mark_online(user_id, dto.channel);

    let backlog_delivered = state.worker.deliver_backlog(user_id).await?;

    info!(
        user_id,
        channel = ?dto.channel,
        backlog_delivered,
        "User marked online"
    );
    Ok(Json(ConnectivityResponse {
        status: state.connectivity.status(user_id),
        backlog_delivered,
    }))
}

/// Marks a user as offline.
#[utoipa::path(
    post,
    path = "/connectivity/{user_id}/offline",
    params(
        ("user_id" = i64, Path, description = "User to mark offline")
    ),
    responses(
        (status = 200, description = "User marked offline", body = ConnectivityResponse),
    ),
    tag = CONNECTIVITY_TAG
)]
pub async fn mark_offline(
    State(state): State<EngineState>,
    Path(user_id): Path<i64>,
) -> Json<ConnectivityResponse> {
    state.connectivity.mark_offline(user_id);

    info!(user_id, "User marked offline");
    Json(ConnectivityResponse {
        status: state.connectivity.status(user_id),
        backlog_delivered: 0,
    })
}
