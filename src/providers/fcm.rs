//! FCM push provider implementation.
//!
//! Mobile push with a native batch endpoint: multicast sends go out as a
//! single request with per-recipient results parsed from the response.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;

use crate::config::FcmConfig;
use crate::error::{DeliveryError, classify_reqwest_error, classify_status};
use crate::models::DeliveryErrorKind;
use crate::providers::client::HTTP_CLIENT;
use crate::providers::provider::{
    PushMessage, PushProvider, ProviderResponse, RecipientDelivery,
};

/// Per-recipient entry in a batch send response
#[derive(Debug, Deserialize)]
struct BatchResult {
    recipient_id: i64,
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    results: Vec<BatchResult>,
}

/// FCM push provider
pub struct FcmProvider {
    config: FcmConfig,
}

impl FcmProvider {
    /// Creates a new FCM provider with configuration
    pub fn new(config: FcmConfig) -> Self {
        Self { config }
    }

    fn message_json(&self, message: &PushMessage) -> serde_json::Value {
        json!({
            "type": message.notification_type,
            "title": message.title,
            "body": message.body,
            "payload": message.payload,
            "priority": message.priority,
        })
    }
}

#[async_trait]
impl PushProvider for FcmProvider {
    async fn send(
        &self,
        recipient_id: i64,
        message: &PushMessage,
    ) -> Result<ProviderResponse, DeliveryError> {
        let start = Instant::now();

        let mut body = self.message_json(message);
        body["recipient_id"] = json!(recipient_id);

        let response = HTTP_CLIENT
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
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
            let text = response.text().await.ok();
            Err(classify_status(self.name(), status.as_u16(), text.as_deref()))
        }
    }

    /// Sends one batch request and maps per-recipient results back.
    ///
    /// A transport or HTTP-level failure fails the whole batch with the
    /// same classified error for every recipient.
    async fn send_multicast(
        &self,
        recipient_ids: &[i64],
        message: &PushMessage,
    ) -> Vec<RecipientDelivery> {
        let start = Instant::now();

        let mut body = self.message_json(message);
        body["recipient_ids"] = json!(recipient_ids);

        let all_failed = |error: DeliveryError| {
            recipient_ids
                .iter()
                .map(|&recipient_id| RecipientDelivery {
                    recipient_id,
                    result: Err(error.clone()),
                })
                .collect::<Vec<_>>()
        };

        let response = match HTTP_CLIENT
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return all_failed(classify_reqwest_error(self.name(), &e)),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.ok();
            return all_failed(classify_status(self.name(), status.as_u16(), text.as_deref()));
        }

        // Batch accepted; individual recipients may still have failed.
        match response.json::<BatchResponse>().await {
            Ok(batch) => batch
                .results
                .into_iter()
                .map(|entry| RecipientDelivery {
                    recipient_id: entry.recipient_id,
                    result: if entry.success {
                        Ok(ProviderResponse {
                            status_code: status.as_u16(),
                            duration_ms,
                        })
                    } else {
                        Err(DeliveryError::new(
                            DeliveryErrorKind::ProviderUnavailable,
                            entry.error.unwrap_or_else(|| "recipient rejected".to_string()),
                        ))
                    },
                })
                .collect(),
            // 2xx with an unparsable body: treat the batch as accepted
            Err(_) => recipient_ids
                .iter()
                .map(|&recipient_id| RecipientDelivery {
                    recipient_id,
                    result: Ok(ProviderResponse {
                        status_code: status.as_u16(),
                        duration_ms,
                    }),
                })
                .collect(),
        }
    }

    fn name(&self) -> &'static str {
        "fcm"
    }

    fn supports_multicast(&self) -> bool {
        true
    }

    fn is_available(&self) -> bool {
        self.config.enabled && !self.config.endpoint.is_empty() && !self.config.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_multicast_supported() {
        let provider = FcmProvider::new(FcmConfig::default());
        assert!(provider.supports_multicast());
        assert_eq!(provider.name(), "fcm");
    }

    #[test]
    fn unavailable_without_credentials() {
        let provider = FcmProvider::new(FcmConfig {
            enabled: true,
            endpoint: "https://fcm.example.com/send".to_string(),
            api_key: String::new(),
        });
        assert!(!provider.is_available());
    }

    #[test]
    fn batch_response_parses_mixed_results() {
        let raw = r#"{"results":[
            {"recipient_id":1,"success":true},
            {"recipient_id":2,"success":false,"error":"unregistered"}
        ]}"#;
        let batch: BatchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(batch.results.len(), 2);
        assert!(batch.results[0].success);
        assert_eq!(batch.results[1].error.as_deref(), Some("unregistered"));
    }
}
