//! Durable backing store for cold and terminal queued notifications.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{DeliveryStatus, QueuedNotification};
use crate::repositories::QueuedNotificationRepository;

/// Persistence seam for the cold side of the hybrid queue.
///
/// Work whose retry time is beyond the hot horizon, overflow from the
/// bounded memory store, and terminal rows kept for retention all live
/// behind this trait.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn upsert(&self, notification: &QueuedNotification) -> EngineResult<()>;
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<QueuedNotification>>;
    async fn load_due(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> EngineResult<Vec<QueuedNotification>>;
    async fn load_pending_for_recipient(
        &self,
        recipient_id: i64,
    ) -> EngineResult<Vec<QueuedNotification>>;
    async fn delete_by_id(&self, id: Uuid) -> EngineResult<bool>;
    async fn reset_failed(&self, now: NaiveDateTime) -> EngineResult<u64>;
    async fn mark_expired(&self, now: NaiveDateTime) -> EngineResult<u64>;
    async fn purge_terminal_before(&self, cutoff: NaiveDateTime) -> EngineResult<u64>;
    async fn count_by_status(&self, status: DeliveryStatus) -> EngineResult<i64>;
}

/// Postgres-backed durable store
#[derive(Clone)]
pub struct PgDurableStore {
    repository: QueuedNotificationRepository,
}

impl PgDurableStore {
    pub fn new(repository: QueuedNotificationRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl DurableStore for PgDurableStore {
    async fn upsert(&self, notification: &QueuedNotification) -> EngineResult<()> {
        self.repository.upsert(notification).await
    }

    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<QueuedNotification>> {
        self.repository.find_by_id(id).await
    }

    async fn load_due(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> EngineResult<Vec<QueuedNotification>> {
        self.repository.load_due(now, limit).await
    }

    async fn load_pending_for_recipient(
        &self,
        recipient_id: i64,
    ) -> EngineResult<Vec<QueuedNotification>> {
        self.repository.load_pending_for_recipient(recipient_id).await
    }

    async fn delete_by_id(&self, id: Uuid) -> EngineResult<bool> {
        self.repository.delete_by_id(id).await
    }

    async fn reset_failed(&self, now: NaiveDateTime) -> EngineResult<u64> {
        self.repository.reset_failed(now).await
    }

    async fn mark_expired(&self, now: NaiveDateTime) -> EngineResult<u64> {
        self.repository.mark_expired(now).await
    }

    async fn purge_terminal_before(&self, cutoff: NaiveDateTime) -> EngineResult<u64> {
        self.repository.purge_terminal_before(cutoff).await
    }

    async fn count_by_status(&self, status: DeliveryStatus) -> EngineResult<i64> {
        self.repository.count_by_status(status).await
    }
}
