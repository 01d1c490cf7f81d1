//! Classified delivery errors returned by push providers.
//!
//! Every failed provider send is classified into a [`DeliveryErrorKind`]
//! before it reaches the queue, so the retry scheduler can pick the right
//! policy for it. Delivery errors never propagate to `submit` callers.

use thiserror::Error;

use crate::models::DeliveryErrorKind;

/// A provider send failure, carrying its retry classification.
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct DeliveryError {
    pub kind: DeliveryErrorKind,
    pub message: String,
}

impl DeliveryError {
    pub fn new(kind: DeliveryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(provider: &str, secs: u64) -> Self {
        Self::new(
            DeliveryErrorKind::NetworkTimeout,
            format!("{provider} send timed out after {secs}s"),
        )
    }
}

/// Classifies a reqwest transport error into a retry kind.
///
/// Timeouts are network timeouts; everything else on the transport level
/// means the provider endpoint could not be reached.
pub fn classify_reqwest_error(provider: &str, error: &reqwest::Error) -> DeliveryError {
    let kind = if error.is_timeout() {
        DeliveryErrorKind::NetworkTimeout
    } else {
        DeliveryErrorKind::ProviderUnavailable
    };
    DeliveryError::new(kind, format!("{provider}: {error}"))
}

/// Classifies a non-success HTTP status from a provider endpoint.
pub fn classify_status(provider: &str, status: u16, body: Option<&str>) -> DeliveryError {
    let kind = match status {
        401 | 403 => DeliveryErrorKind::InvalidCredential,
        429 => DeliveryErrorKind::ProviderRateLimited,
        408 | 504 => DeliveryErrorKind::NetworkTimeout,
        _ => DeliveryErrorKind::ProviderUnavailable,
    };
    let detail = body.unwrap_or("no response body");
    DeliveryError::new(kind, format!("{provider} returned {status}: {detail}"))
}
