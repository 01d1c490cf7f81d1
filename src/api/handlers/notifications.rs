//! Notification submission endpoints.

use axum::{Json, extract::State};
use tracing::info;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::doc::NOTIFICATION_TAG;
use crate::api::dto::{ErrorResponse, MulticastNotificationRequest, SubmitNotificationRequest};
use crate::error::EngineResult;
use crate::orchestrator::{DeliveryOutcome, MulticastSummary};
use crate::state::EngineState;
use crate::utils::ValidatedJson;

pub fn routes() -> OpenApiRouter<EngineState> {
    OpenApiRouter::new()
        .routes(routes!(submit_notification))
        .routes(routes!(submit_multicast))
}

/// Submits a single notification for delivery.
///
/// The outcome says what happened synchronously: immediate delivery,
/// queued for retry, or a policy rejection.
#[utoipa::path(
    post,
    path = "/notifications/submit",
    request_body = SubmitNotificationRequest,
    responses(
        (status = 200, description = "Notification accepted", body = DeliveryOutcome),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Recipient not found", body = ErrorResponse),
    ),
    tag = NOTIFICATION_TAG
)]
pub async fn submit_notification(
    State(state): State<EngineState>,
    ValidatedJson(dto): ValidatedJson<SubmitNotificationRequest>,
) -> EngineResult<Json<DeliveryOutcome>> {
    let request = dto.into_request();
    let recipient_id = request.recipient_id;

    let outcome = state.orchestrator.submit(request).await?;

    info!(
        recipient_id,
        outcome = ?outcome,
        "Notification submitted"
    );
    Ok(Json(outcome))
}

/// Submits one notification payload to many recipients.
///
/// Per-recipient failures are absorbed into the summary counters; the
/// call fails only when the request itself is malformed.
#[utoipa::path(
    post,
    path = "/notifications/multicast",
    request_body = MulticastNotificationRequest,
    responses(
        (status = 200, description = "Multicast processed", body = MulticastSummary),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    ),
    tag = NOTIFICATION_TAG
)]
pub async fn submit_multicast(
    State(state): State<EngineState>,
    ValidatedJson(dto): ValidatedJson<MulticastNotificationRequest>,
) -> EngineResult<Json<MulticastSummary>> {
    let (recipients, template) = dto.into_template();
    let recipient_count = recipients.len();

    let summary = state
        .orchestrator
        .submit_multicast(&recipients, template)
        .await?;

    info!(
        recipient_count,
        delivered = summary.delivered,
        queued = summary.queued,
        "Multicast submitted"
    );
    Ok(Json(summary))
}
