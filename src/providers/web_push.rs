//! Web push provider implementation.
//!
//! Posts to the realtime gateway's internal session push API using the
//! global HTTP_CLIENT. The gateway fans the message out to the user's live
//! browser sessions.

use async_trait::async_trait;
use serde_json::json;
use std::time::Instant;

use crate::config::WebPushConfig;
use crate::error::{DeliveryError, classify_reqwest_error, classify_status};
use crate::providers::client::HTTP_CLIENT;
use crate::providers::provider::{PushMessage, PushProvider, ProviderResponse};

/// Web push provider
pub struct WebPushProvider {
    config: WebPushConfig,
}

impl WebPushProvider {
    /// Creates a new web push provider with configuration
    pub fn new(config: WebPushConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PushProvider for WebPushProvider {
    /// Sends a notification through the gateway push API.
    ///
    /// The gateway returns 404 when the user has no live session; that is
    /// reported as unavailable so the queue holds the message for retry or
    /// a lower-priority provider picks it up.
    async fn send(
        &self,
        recipient_id: i64,
        message: &PushMessage,
    ) -> Result<ProviderResponse, DeliveryError> {
        let start = Instant::now();

        let response = HTTP_CLIENT
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "recipient_id": recipient_id,
                "type": message.notification_type,
                "title": message.title,
                "body": message.body,
                "payload": message.payload,
                "priority": message.priority,
            }))
            .send()
            .await
            .map_err(|e| classify_reqwest_error(self.name(), &e))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        if status.is_success() {
            Ok(ProviderResponse {
                status_code: status.as_u16(),
                duration_ms,
            })
        } else {
            let body = response.text().await.ok();
            Err(classify_status(self.name(), status.as_u16(), body.as_deref()))
        }
    }

    fn name(&self) -> &'static str {
        "web_push"
    }

    fn is_available(&self) -> bool {
        self.config.enabled && !self.config.endpoint.is_empty()
    }
}
