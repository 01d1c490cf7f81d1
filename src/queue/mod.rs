//! Hybrid retry queue for undelivered notifications.
//!
//! Work due soon lives in a bounded in-memory store; work scheduled beyond
//! the hot horizon, overflow, and terminal rows live in the durable store.
//! All status transitions and attempt counting happen here, never in the
//! orchestrator or providers.

pub mod connectivity;
pub mod durable;
pub mod memory;
pub mod retry;
pub mod worker;

pub use connectivity::ConnectivityTracker;
pub use durable::{DurableStore, PgDurableStore};
pub use memory::MemoryStore;
pub use retry::{RetryPolicy, RetryRule};
pub use worker::QueueWorker;

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::EngineResult;
use crate::models::{
    DeliveryErrorKind, DeliveryStatus, NotificationRequest, QueuedNotification,
};

/// What became of a failed delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// Another attempt is scheduled for the given time
    Rescheduled(NaiveDateTime),
    /// The attempt ceiling was reached; the notification is Failed
    Exhausted,
    /// The expiry deadline passed; the notification is Expired
    Expired,
}

/// Counters from one cleanup pass
#[derive(Debug, Clone, Copy, Default, Serialize, utoipa::ToSchema)]
pub struct CleanupReport {
    pub memory_expired: u64,
    pub durable_expired: u64,
    pub purged: u64,
}

/// Point-in-time queue occupancy snapshot
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct QueueStats {
    pub in_memory: usize,
    pub memory_capacity: usize,
    pub durable_pending: i64,
    pub delivered: i64,
    pub failed: i64,
    pub expired: i64,
}

// ============================================================================
// NotificationQueue
// ============================================================================

/// Facade over the hot and cold stores.
pub struct NotificationQueue {
    memory: MemoryStore,
    durable: Arc<dyn DurableStore>,
    policy: RetryPolicy,
    hot_horizon: Duration,
    default_max_attempts: i32,
    retention: Duration,
}

impl NotificationQueue {
    pub fn new(config: &QueueConfig, durable: Arc<dyn DurableStore>) -> Self {
        Self {
            memory: MemoryStore::new(config.memory_capacity),
            durable,
            policy: RetryPolicy::new(config.retry_delay_cap_secs),
            hot_horizon: Duration::seconds(config.hot_horizon_secs as i64),
            default_max_attempts: config.default_max_attempts,
            retention: Duration::days(config.retention_days as i64),
        }
    }

    /// Accepts a notification for deferred delivery, returning its id.
    pub async fn enqueue(&self, request: NotificationRequest) -> EngineResult<Uuid> {
        let notification = QueuedNotification::from_request(request, self.default_max_attempts);
        let id = notification.id;
        tracing::debug!(
            notification_id = %id,
            recipient_id = notification.recipient_id,
            priority = notification.priority.as_str(),
            "Enqueued notification for deferred delivery"
        );
        self.place(notification).await?;
        Ok(id)
    }

    /// Stores a notification on the side its retry time belongs to.
    ///
    /// Terminal work always goes durable (retention rows). Pending work
    /// goes to memory when due within the hot horizon and capacity allows,
    /// otherwise overflows to the durable store.
    async fn place(&self, notification: QueuedNotification) -> EngineResult<()> {
        if notification.status.is_terminal() {
            return self.durable.upsert(&notification).await;
        }

        let horizon = chrono::Utc::now().naive_utc() + self.hot_horizon;
        let overflow = if notification.next_retry_at <= horizon {
            match self.memory.insert(notification) {
                Ok(()) => return Ok(()),
                Err(bounced) => bounced,
            }
        } else {
            notification
        };
        self.durable.upsert(&overflow).await
    }

    /// Removes and returns up to `limit` due notifications across both
    /// stores, most urgent first, marked Delivering.
    ///
    /// Ownership of returned work transfers to the caller: it exists in
    /// neither store until handed back via [`complete`](Self::complete) or
    /// [`fail`](Self::fail).
    pub async fn drain_due(
        &self,
        now: NaiveDateTime,
        limit: usize,
    ) -> EngineResult<Vec<QueuedNotification>> {
        let mut batch = self.memory.take_due(now, limit);

        if batch.len() < limit {
            let remaining = (limit - batch.len()) as i64;
            let cold = self.durable.load_due(now, remaining).await?;
            for notification in cold {
                self.durable.delete_by_id(notification.id).await?;
                batch.push(notification);
            }
        }

        batch.sort_by_key(|n| (n.priority, n.next_retry_at));
        for notification in &mut batch {
            notification.status = DeliveryStatus::Delivering;
        }
        Ok(batch)
    }

    /// Pulls all pending work for a recipient, due or not, marked
    /// Delivering with an immediate retry time.
    ///
    /// Called when the recipient reconnects: their backlog becomes
    /// deliverable right away regardless of backoff schedule.
    pub async fn drain_for_recipient(
        &self,
        recipient_id: i64,
        now: NaiveDateTime,
    ) -> EngineResult<Vec<QueuedNotification>> {
        let mut batch = self.memory.take_for_recipient(recipient_id);
        let cold = self.durable.load_pending_for_recipient(recipient_id).await?;
        for notification in cold {
            self.durable.delete_by_id(notification.id).await?;
            batch.push(notification);
        }

        let mut deliverable = Vec::with_capacity(batch.len());
        for mut notification in batch {
            if notification.is_expired_at(now) {
                notification.status = DeliveryStatus::Expired;
                self.durable.upsert(&notification).await?;
                continue;
            }
            notification.status = DeliveryStatus::Delivering;
            notification.next_retry_at = now;
            deliverable.push(notification);
        }
        deliverable.sort_by_key(|n| n.priority);
        Ok(deliverable)
    }

    /// Finalizes a successful delivery; the row is kept for retention.
    pub async fn complete(&self, mut notification: QueuedNotification) -> EngineResult<()> {
        notification.status = DeliveryStatus::Delivered;
        self.durable.upsert(&notification).await
    }

    /// Records a failed attempt and decides what happens next.
    ///
    /// The attempt counter is incremented exactly once per attempt, here
    /// and nowhere else. The attempt ceiling narrows to the classified
    /// error's policy, so a credential error (ceiling zero) fails the
    /// notification on the spot.
    pub async fn fail(
        &self,
        mut notification: QueuedNotification,
        kind: DeliveryErrorKind,
        now: NaiveDateTime,
    ) -> EngineResult<RetryDisposition> {
        notification.attempt_count += 1;
        notification.last_error = Some(kind);
        notification.max_attempts = notification
            .max_attempts
            .min(RetryPolicy::max_attempts(kind));

        if notification.is_expired_at(now) {
            notification.status = DeliveryStatus::Expired;
            self.durable.upsert(&notification).await?;
            return Ok(RetryDisposition::Expired);
        }

        if notification.attempt_count >= notification.max_attempts {
            tracing::warn!(
                notification_id = %notification.id,
                recipient_id = notification.recipient_id,
                attempts = notification.attempt_count,
                error_kind = kind.as_str(),
                "Notification failed permanently"
            );
            notification.status = DeliveryStatus::Failed;
            self.durable.upsert(&notification).await?;
            return Ok(RetryDisposition::Exhausted);
        }

        let delay = self.policy.delay(kind, notification.attempt_count);
        notification.status = DeliveryStatus::Pending;
        notification.next_retry_at = now + Duration::milliseconds(delay.as_millis() as i64);
        let next_retry_at = notification.next_retry_at;
        tracing::debug!(
            notification_id = %notification.id,
            attempt = notification.attempt_count,
            error_kind = kind.as_str(),
            next_retry_at = %next_retry_at,
            "Delivery attempt failed, rescheduled"
        );
        self.place(notification).await?;
        Ok(RetryDisposition::Rescheduled(next_retry_at))
    }

    /// Returns unexpired Failed notifications to Pending with an immediate
    /// retry time and a fresh attempt counter, making them eligible for the
    /// next drain pass. Returns how many were reset.
    ///
    /// Failed rows are terminal and therefore always durable, so only the
    /// cold store is touched.
    pub async fn retry_failed(&self, now: NaiveDateTime) -> EngineResult<u64> {
        let reset = self.durable.reset_failed(now).await?;
        if reset > 0 {
            tracing::info!(reset, "Failed notifications returned to the retry queue");
        }
        Ok(reset)
    }

    /// Expires overdue work on both sides and purges terminal rows past
    /// the retention window.
    pub async fn cleanup(&self, now: NaiveDateTime) -> EngineResult<CleanupReport> {
        let mut report = CleanupReport::default();

        for mut notification in self.memory.sweep_expired(now) {
            notification.status = DeliveryStatus::Expired;
            self.durable.upsert(&notification).await?;
            report.memory_expired += 1;
        }

        report.durable_expired = self.durable.mark_expired(now).await?;
        report.purged = self.durable.purge_terminal_before(now - self.retention).await?;

        if report.memory_expired + report.durable_expired + report.purged > 0 {
            tracing::info!(
                memory_expired = report.memory_expired,
                durable_expired = report.durable_expired,
                purged = report.purged,
                "Queue cleanup pass finished"
            );
        }
        Ok(report)
    }

    pub async fn stats(&self) -> EngineResult<QueueStats> {
        Ok(QueueStats {
            in_memory: self.memory.len(),
            memory_capacity: self.memory.capacity(),
            durable_pending: self.durable.count_by_status(DeliveryStatus::Pending).await?,
            delivered: self.durable.count_by_status(DeliveryStatus::Delivered).await?,
            failed: self.durable.count_by_status(DeliveryStatus::Failed).await?,
            expired: self.durable.count_by_status(DeliveryStatus::Expired).await?,
        })
    }
}
