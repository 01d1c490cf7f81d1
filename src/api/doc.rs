//! OpenAPI documentation configuration.

use utoipa::OpenApi;

pub const NOTIFICATION_TAG: &str = "Notifications";
pub const CONNECTIVITY_TAG: &str = "Connectivity";
pub const QUEUE_TAG: &str = "Queue";
pub const HEALTH_TAG: &str = "Health";

/// Base OpenAPI document. Paths and schemas are collected from the
/// route macros at router construction time.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Courier Delivery Engine API",
        description = "Operational HTTP API for the notification delivery engine",
    ),
    tags(
        (name = NOTIFICATION_TAG, description = "Notification submission"),
        (name = CONNECTIVITY_TAG, description = "User connectivity updates"),
        (name = QUEUE_TAG, description = "Retry queue introspection"),
        (name = HEALTH_TAG, description = "Liveness and component health"),
    ),
    components(schemas(crate::api::dto::ErrorResponse))
)]
pub struct ApiDoc;
