use thiserror::Error;

use crate::error::DatabaseErrorConverter;

/// A single field validation failure, collected from `validator` output.
#[derive(Debug, Clone)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Engine-wide error type for all synchronously surfaced failures.
///
/// Delivery failures are deliberately NOT represented here: a failed
/// provider send is absorbed into the retry queue and only ever reaches
/// callers through the persisted notification status or health reports.
/// See [`crate::error::DeliveryError`] for the classified delivery side.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The notification recipient does not exist
    #[error("Recipient not found: user {user_id}")]
    RecipientNotFound { user_id: i64 },

    /// A user attempted to notify themselves
    #[error("Self-notification rejected for user {user_id}")]
    SelfNotification { user_id: i64 },

    /// Generic resource lookup failure
    #[error("Resource not found: {entity} with {field}={value}")]
    NotFound {
        entity: String,
        field: String,
        value: String,
    },

    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Multiple field validation failures from request DTOs
    #[error("Validation failed for {} field(s)", errors.len())]
    ValidationErrors { errors: Vec<FieldError> },

    /// Bad request error with descriptive message
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Database operation error with operation context
    #[error("Database operation failed: {operation}")]
    Database {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Connection pool error
    #[error("Connection pool error")]
    ConnectionPool {
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for EngineError {
    fn from(error: anyhow::Error) -> Self {
        EngineError::Internal { source: error }
    }
}

impl From<diesel::result::Error> for EngineError {
    fn from(error: diesel::result::Error) -> Self {
        DatabaseErrorConverter::convert_diesel_error(error, "database operation")
    }
}

impl From<axum::extract::rejection::JsonRejection> for EngineError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        EngineError::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let errors = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value for {field}")),
                })
            })
            .collect();
        EngineError::ValidationErrors { errors }
    }
}

/// Type alias for Result with EngineError to simplify function signatures
pub type EngineResult<T> = Result<T, EngineError>;
