//! Core push provider trait and types.
//!
//! This module provides the abstraction for push providers, allowing easy
//! extension to new delivery channels without touching the manager or the
//! orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::DeliveryError;
use crate::models::{NotificationRequest, NotificationType, Priority};

/// Message handed to a push provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    pub payload: JsonValue,
    pub priority: Priority,
}

impl From<&NotificationRequest> for PushMessage {
    fn from(request: &NotificationRequest) -> Self {
        Self {
            notification_type: request.notification_type,
            title: request.title.clone(),
            body: request.body.clone(),
            payload: request.payload.clone(),
            priority: request.priority,
        }
    }
}

/// Result of a successful provider send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// HTTP status code returned by the downstream service
    pub status_code: u16,
    /// Time taken for the operation in milliseconds
    pub duration_ms: u64,
}

/// Per-recipient outcome of a multicast send
#[derive(Debug)]
pub struct RecipientDelivery {
    pub recipient_id: i64,
    pub result: Result<ProviderResponse, DeliveryError>,
}

/// Trait for push providers (web gateway, FCM, APNs, ...)
///
/// Uses `async_trait` to support async methods with dynamic dispatch.
/// All providers must be Send + Sync for use in async contexts. A failed
/// send returns a classified [`DeliveryError`]; the caller decides whether
/// and how to retry.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Sends a message to a single recipient
    ///
    /// # Arguments
    /// * `recipient_id` - The target user
    /// * `message` - The message to deliver
    ///
    /// # Returns
    /// The provider response on success, a classified delivery error otherwise
    async fn send(
        &self,
        recipient_id: i64,
        message: &PushMessage,
    ) -> Result<ProviderResponse, DeliveryError>;

    /// Sends a message to many recipients, returning per-recipient outcomes.
    ///
    /// The default implementation fans out concurrently via single sends.
    /// Providers with a native batch endpoint override this.
    async fn send_multicast(
        &self,
        recipient_ids: &[i64],
        message: &PushMessage,
    ) -> Vec<RecipientDelivery> {
        let sends = recipient_ids.iter().map(|&recipient_id| async move {
            RecipientDelivery {
                recipient_id,
                result: self.send(recipient_id, message).await,
            }
        });
        futures::future::join_all(sends).await
    }

    /// Returns the provider name for logging and selection
    fn name(&self) -> &'static str;

    /// Whether the provider has a native batch endpoint
    fn supports_multicast(&self) -> bool {
        false
    }

    /// Configuration-level availability (credentials present, endpoint set).
    ///
    /// Health-based availability is the manager's concern, not the provider's.
    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeliveryErrorKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct EvenRecipientsFail;

    #[async_trait]
    impl PushProvider for EvenRecipientsFail {
        async fn send(
            &self,
            recipient_id: i64,
            _message: &PushMessage,
        ) -> Result<ProviderResponse, DeliveryError> {
            if recipient_id % 2 == 0 {
                Err(DeliveryError::new(
                    DeliveryErrorKind::ProviderUnavailable,
                    "stub failure",
                ))
            } else {
                Ok(ProviderResponse {
                    status_code: 200,
                    duration_ms: 1,
                })
            }
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    fn message() -> PushMessage {
        PushMessage {
            notification_type: NotificationType::Message,
            title: "hi".to_string(),
            body: "there".to_string(),
            payload: json!({}),
            priority: Priority::Normal,
        }
    }

    #[tokio::test]
    async fn default_multicast_fans_out_per_recipient() {
        let provider = EvenRecipientsFail;
        let results = provider.send_multicast(&[1, 2, 3, 4], &message()).await;

        assert_eq!(results.len(), 4);
        assert!(results[0].result.is_ok());
        assert!(results[1].result.is_err());
        assert!(results[2].result.is_ok());
        assert!(results[3].result.is_err());
    }

    struct CountingProvider {
        calls: AtomicI64,
    }

    #[async_trait]
    impl PushProvider for CountingProvider {
        async fn send(
            &self,
            _recipient_id: i64,
            _message: &PushMessage,
        ) -> Result<ProviderResponse, DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderResponse {
                status_code: 200,
                duration_ms: 0,
            })
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn default_multicast_sends_once_per_recipient() {
        let provider = CountingProvider {
            calls: AtomicI64::new(0),
        };
        provider.send_multicast(&[10, 20, 30], &message()).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }
}
