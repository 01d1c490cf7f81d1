//! Notification submission DTOs.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{NotificationRequest, NotificationType, Priority};

fn default_payload() -> JsonValue {
    JsonValue::Object(serde_json::Map::new())
}

fn default_priority() -> Priority {
    Priority::Normal
}

/// Request body for submitting one notification.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitNotificationRequest {
    /// Target user
    #[validate(range(min = 1, message = "Recipient id must be positive"))]
    pub recipient_id: i64,

    /// The user who caused the notification, if any
    pub actor_id: Option<i64>,

    pub notification_type: NotificationType,

    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 4096, message = "Body must be between 1 and 4096 characters"))]
    pub body: String,

    /// Arbitrary structured payload delivered alongside the text
    #[serde(default = "default_payload")]
    #[schema(value_type = Object)]
    pub payload: JsonValue,

    #[serde(default = "default_priority")]
    pub priority: Priority,

    /// Provider to try first, by name
    pub preferred_provider: Option<String>,
}

impl SubmitNotificationRequest {
    pub fn into_request(self) -> NotificationRequest {
        let mut request = NotificationRequest::new(
            self.recipient_id,
            self.actor_id,
            self.notification_type,
            self.title,
            self.body,
            self.payload,
            self.priority,
        );
        if let Some(provider) = self.preferred_provider {
            request = request.with_preferred_provider(provider);
        }
        request
    }
}

/// Request body for submitting one payload to many recipients.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MulticastNotificationRequest {
    #[validate(length(min = 1, max = 10000, message = "Between 1 and 10000 recipients required"))]
    pub recipient_ids: Vec<i64>,

    /// The user who caused the notification, if any
    pub actor_id: Option<i64>,

    pub notification_type: NotificationType,

    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 4096, message = "Body must be between 1 and 4096 characters"))]
    pub body: String,

    #[serde(default = "default_payload")]
    #[schema(value_type = Object)]
    pub payload: JsonValue,

    #[serde(default = "default_priority")]
    pub priority: Priority,

    pub preferred_provider: Option<String>,
}

impl MulticastNotificationRequest {
    /// Builds the per-recipient template; the template's own recipient id
    /// is a placeholder the orchestrator overwrites.
    pub fn into_template(self) -> (Vec<i64>, NotificationRequest) {
        let mut template = NotificationRequest::new(
            0,
            self.actor_id,
            self.notification_type,
            self.title,
            self.body,
            self.payload,
            self.priority,
        );
        if let Some(provider) = self.preferred_provider {
            template = template.with_preferred_provider(provider);
        }
        (self.recipient_ids, template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn submit_request_defaults_priority_and_payload() {
        let dto: SubmitNotificationRequest = serde_json::from_value(json!({
            "recipient_id": 7,
            "notification_type": "message",
            "title": "hi",
            "body": "there"
        }))
        .unwrap();

        assert!(dto.validate().is_ok());
        let request = dto.into_request();
        assert_eq!(request.priority, Priority::Normal);
        assert_eq!(request.payload, json!({}));
        assert!(request.preferred_provider.is_none());
    }

    #[test]
    fn empty_title_fails_validation() {
        let dto: SubmitNotificationRequest = serde_json::from_value(json!({
            "recipient_id": 7,
            "notification_type": "like",
            "title": "",
            "body": "x"
        }))
        .unwrap();

        assert!(dto.validate().is_err());
    }

    #[test]
    fn multicast_template_carries_preferred_provider() {
        let dto: MulticastNotificationRequest = serde_json::from_value(json!({
            "recipient_ids": [1, 2, 3],
            "notification_type": "system",
            "title": "Maintenance",
            "body": "Scheduled downtime at midnight",
            "priority": "high",
            "preferred_provider": "web_push"
        }))
        .unwrap();

        assert!(dto.validate().is_ok());
        let (recipients, template) = dto.into_template();
        assert_eq!(recipients, vec![1, 2, 3]);
        assert_eq!(template.priority, Priority::High);
        assert_eq!(template.preferred_provider.as_deref(), Some("web_push"));
    }

    #[test]
    fn empty_recipient_list_fails_validation() {
        let dto: MulticastNotificationRequest = serde_json::from_value(json!({
            "recipient_ids": [],
            "notification_type": "system",
            "title": "x",
            "body": "y"
        }))
        .unwrap();

        assert!(dto.validate().is_err());
    }
}
