//! APNs push provider implementation.
//!
//! Per-device mobile push; multicast uses the trait's default concurrent
//! fan-out.

use async_trait::async_trait;
use serde_json::json;
use std::time::Instant;

use crate::config::ApnsConfig;
use crate::error::{DeliveryError, classify_reqwest_error, classify_status};
use crate::providers::client::HTTP_CLIENT;
use crate::providers::provider::{PushMessage, PushProvider, ProviderResponse};

/// APNs push provider
pub struct ApnsProvider {
    config: ApnsConfig,
}

impl ApnsProvider {
    /// Creates a new APNs provider with configuration
    pub fn new(config: ApnsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PushProvider for ApnsProvider {
    async fn send(
        &self,
        recipient_id: i64,
        message: &PushMessage,
    ) -> Result<ProviderResponse, DeliveryError> {
        let start = Instant::now();

        let response = HTTP_CLIENT
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .header("apns-topic", &self.config.topic)
            .json(&json!({
                "recipient_id": recipient_id,
                "aps": {
                    "alert": {
                        "title": message.title,
                        "body": message.body,
                    },
                },
                "type": message.notification_type,
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
        "apns"
    }

    fn is_available(&self) -> bool {
        self.config.enabled && !self.config.endpoint.is_empty() && !self.config.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_out_multicast_only() {
        let provider = ApnsProvider::new(ApnsConfig::default());
        assert!(!provider.supports_multicast());
        assert_eq!(provider.name(), "apns");
    }
}
