//! Seam to the surrounding application.

use async_trait::async_trait;

use crate::error::EngineResult;
use crate::models::{NotificationRecord, NotificationType};

/// Directory of users, relationships and notification preferences.
///
/// The engine never owns user data; everything it needs to validate a
/// submission is asked through this trait. Quiet-hours windows are part of
/// `notifications_allowed`, evaluated by the implementor.
#[async_trait]
pub trait AppDirectory: Send + Sync {
    async fn user_exists(&self, user_id: i64) -> EngineResult<bool>;

    /// Whether `target_id` has blocked `actor_id`.
    async fn is_blocked(&self, actor_id: i64, target_id: i64) -> EngineResult<bool>;

    /// Whether the user accepts this notification type right now
    /// (preferences and quiet hours combined).
    async fn notifications_allowed(
        &self,
        user_id: i64,
        notification_type: NotificationType,
    ) -> EngineResult<bool>;

    /// Persists the in-app notification-center record.
    async fn persist_notification_record(&self, record: &NotificationRecord)
        -> EngineResult<()>;
}

/// Permissive directory for standalone deployments.
///
/// The HTTP server has no user database of its own, so it accepts any
/// positive user id, never reports blocks, and allows every notification
/// type. In-app records are logged instead of stored. Embedders wire in a
/// real implementation backed by their user store.
pub struct OpenDirectory;

#[async_trait]
impl AppDirectory for OpenDirectory {
    async fn user_exists(&self, user_id: i64) -> EngineResult<bool> {
        Ok(user_id > 0)
    }

    async fn is_blocked(&self, _actor_id: i64, _target_id: i64) -> EngineResult<bool> {
        Ok(false)
    }

    async fn notifications_allowed(
        &self,
        _user_id: i64,
        _notification_type: NotificationType,
    ) -> EngineResult<bool> {
        Ok(true)
    }

    async fn persist_notification_record(
        &self,
        record: &NotificationRecord,
    ) -> EngineResult<()> {
        tracing::debug!(
            recipient_id = record.recipient_id,
            notification_type = ?record.notification_type,
            "No record store configured, in-app record dropped"
        );
        Ok(())
    }
}
