//! Error response DTO.

use serde::Serialize;
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use crate::error::FieldError;

/// Standard error response format.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Stable machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
    /// Request ID for correlation, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// Creates a new error response with code and message.
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
            request_id: None,
        }
    }

    /// Attaches structured details to the error response.
    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    /// Attaches a request ID for correlation.
    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }

    /// Builds the response for a batch of DTO field validation failures.
    pub fn from_field_errors(errors: &[FieldError]) -> Self {
        let details: Vec<JsonValue> = errors
            .iter()
            .map(|e| {
                serde_json::json!({
                    "field": e.field,
                    "message": e.message,
                })
            })
            .collect();
        Self::new(
            "VALIDATION_ERROR",
            &format!("Validation failed for {} field(s)", errors.len()),
        )
        .with_details(JsonValue::Array(details))
    }
}
