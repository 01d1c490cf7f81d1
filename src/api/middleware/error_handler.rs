//! Error handling for the HTTP surface.
//!
//! Converts [`EngineError`] values into consistent JSON error responses
//! with appropriate HTTP status codes. Internal details are logged but
//! never leaked to clients.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::api::dto::ErrorResponse;
use crate::error::EngineError;

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            EngineError::RecipientNotFound { user_id } => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(
                    "RECIPIENT_NOT_FOUND",
                    &format!("Recipient not found: user {user_id}"),
                ),
            ),
            EngineError::SelfNotification { user_id } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(
                    "SELF_NOTIFICATION",
                    &format!("User {user_id} cannot notify themselves"),
                ),
            ),
            EngineError::NotFound {
                entity,
                field,
                value,
            } => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(
                    "NOT_FOUND",
                    &format!("{entity} with {field}={value} not found"),
                ),
            ),
            EngineError::Validation { field, reason } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(
                    "VALIDATION_ERROR",
                    &format!("Validation failed for {field}: {reason}"),
                ),
            ),
            EngineError::ValidationErrors { errors } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::from_field_errors(errors),
            ),
            EngineError::BadRequest { message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("BAD_REQUEST", message),
            ),
            EngineError::Database { operation, source } => {
                error!(operation = %operation, error = %source, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("DATABASE_ERROR", "A database error occurred"),
                )
            }
            EngineError::Configuration { key, source } => {
                error!(key = %key, error = %source, "Configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "CONFIGURATION_ERROR",
                        &format!("Configuration error for key: {key}"),
                    ),
                )
            }
            EngineError::ConnectionPool { source } => {
                warn!(error = %source, "Connection pool exhausted or unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new("SERVICE_UNAVAILABLE", "Service temporarily unavailable"),
                )
            }
            EngineError::Internal { source } => {
                error!(error = %source, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Maps an engine error to its HTTP status code.
pub fn error_to_status_code(error: &EngineError) -> StatusCode {
    match error {
        EngineError::RecipientNotFound { .. } | EngineError::NotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        EngineError::SelfNotification { .. }
        | EngineError::Validation { .. }
        | EngineError::ValidationErrors { .. }
        | EngineError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        EngineError::ConnectionPool { .. } => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Database { .. }
        | EngineError::Configuration { .. }
        | EngineError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;
    use anyhow::anyhow;

    #[test]
    fn recipient_not_found_maps_to_404() {
        let error = EngineError::RecipientNotFound { user_id: 42 };
        assert_eq!(error_to_status_code(&error), StatusCode::NOT_FOUND);
    }

    #[test]
    fn self_notification_maps_to_400() {
        let error = EngineError::SelfNotification { user_id: 7 };
        assert_eq!(error_to_status_code(&error), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn validation_errors_map_to_400() {
        let error = EngineError::ValidationErrors {
            errors: vec![FieldError {
                field: "title".to_string(),
                message: "too long".to_string(),
            }],
        };
        assert_eq!(error_to_status_code(&error), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn connection_pool_maps_to_503() {
        let error = EngineError::ConnectionPool {
            source: anyhow!("pool timed out"),
        };
        assert_eq!(error_to_status_code(&error), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn database_error_response_is_sanitized() {
        let error = EngineError::Database {
            operation: "insert queued notification".to_string(),
            source: anyhow!("relation \"queued_notifications\" does not exist"),
        };
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_error_maps_to_500() {
        let error = EngineError::Internal {
            source: anyhow!("boom"),
        };
        assert_eq!(
            error_to_status_code(&error),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
