//! Background worker driving queue drains and scheduled cleanup.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler as TokioCronScheduler};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::enhancement::EnhancementLayer;
use crate::error::{EngineError, EngineResult};
use crate::models::QueuedNotification;
use crate::providers::{ProviderManager, PushMessage};
use crate::queue::NotificationQueue;

/// Drives the retry queue: a periodic drain loop plus a cron-scheduled
/// expiry/retention cleanup job.
pub struct QueueWorker {
    queue: Arc<NotificationQueue>,
    providers: Arc<ProviderManager>,
    enhancement: Arc<EnhancementLayer>,
    config: QueueConfig,
    cancel: CancellationToken,
    scheduler: Arc<Mutex<TokioCronScheduler>>,
}

impl QueueWorker {
    pub async fn new(
        queue: Arc<NotificationQueue>,
        providers: Arc<ProviderManager>,
        enhancement: Arc<EnhancementLayer>,
        config: QueueConfig,
        cancel: CancellationToken,
    ) -> EngineResult<Self> {
        let scheduler = TokioCronScheduler::new()
            .await
            .map_err(|e| EngineError::Internal {
                source: anyhow::Error::from(e),
            })?;

        Ok(Self {
            queue,
            providers,
            enhancement,
            config,
            cancel,
            scheduler: Arc::new(Mutex::new(scheduler)),
        })
    }

    /// Starts the cleanup schedule and spawns the drain loop.
    ///
    /// Returns the drain loop handle; the loop exits when the worker's
    /// cancellation token fires.
    pub async fn start(self: &Arc<Self>) -> EngineResult<JoinHandle<()>> {
        self.schedule_cleanup().await?;
        self.scheduler
            .lock()
            .await
            .start()
            .await
            .map_err(|e| EngineError::Internal {
                source: anyhow::Error::from(e),
            })?;

        let worker = Arc::clone(self);
        let handle = tokio::spawn(async move {
            worker.drain_loop().await;
        });

        tracing::info!(
            drain_interval_secs = self.config.drain_interval_secs,
            cleanup_cron = %self.config.cleanup_cron,
            "Queue worker started"
        );
        Ok(handle)
    }

    /// Stops the cron scheduler gracefully.
    pub async fn stop(&self) -> EngineResult<()> {
        self.cancel.cancel();
        self.scheduler
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| EngineError::Internal {
                source: anyhow::Error::from(e),
            })?;
        Ok(())
    }

    async fn schedule_cleanup(&self) -> EngineResult<()> {
        let queue = Arc::clone(&self.queue);

        let job = Job::new_async(self.config.cleanup_cron.as_str(), move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            Box::pin(async move {
                let now = Utc::now().naive_utc();
                if let Err(e) = queue.cleanup(now).await {
                    tracing::error!(error = %e, "Queue cleanup failed");
                }
            })
        })
        .map_err(|e| EngineError::Configuration {
            key: "queue.cleanup_cron".to_string(),
            source: anyhow::Error::from(e),
        })?;

        self.scheduler
            .lock()
            .await
            .add(job)
            .await
            .map_err(|e| EngineError::Internal {
                source: anyhow::Error::from(e),
            })?;
        Ok(())
    }

    async fn drain_loop(&self) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.drain_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Queue drain loop stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.providers.refresh_health();
                    if let Err(e) = self.drain_once().await {
                        tracing::error!(error = %e, "Queue drain pass failed");
                    }
                }
            }
        }
    }

    /// One drain pass: pull due work and attempt delivery for each item.
    ///
    /// The batch is owned by this pass; a store error while finalizing one
    /// item must not drop the rest, so failures are logged per item and
    /// the pass continues.
    pub async fn drain_once(&self) -> EngineResult<usize> {
        let now = Utc::now().naive_utc();
        let batch = self.queue.drain_due(now, self.config.drain_batch_size).await?;
        let drained = batch.len();
        if drained == 0 {
            return Ok(0);
        }

        tracing::debug!(count = drained, "Draining due notifications");
        for notification in batch {
            let id = notification.id;
            if let Err(e) = self.attempt(notification).await {
                tracing::error!(
                    notification_id = %id,
                    error = %e,
                    "Failed to finalize delivery attempt, continuing with batch"
                );
            }
        }
        Ok(drained)
    }

    /// Delivers a recipient's backlog immediately, e.g. on reconnect.
    pub async fn deliver_backlog(&self, recipient_id: i64) -> EngineResult<usize> {
        let now = Utc::now().naive_utc();
        let batch = self.queue.drain_for_recipient(recipient_id, now).await?;
        let count = batch.len();
        for notification in batch {
            let id = notification.id;
            if let Err(e) = self.attempt(notification).await {
                tracing::error!(
                    notification_id = %id,
                    error = %e,
                    "Failed to finalize backlog delivery, continuing with batch"
                );
            }
        }
        Ok(count)
    }

    async fn attempt(&self, notification: QueuedNotification) -> EngineResult<()> {
        let message = PushMessage::from(&notification.to_request());
        let preferred = notification.preferred_provider.clone();

        let attempt_id = Uuid::new_v4();
        self.enhancement
            .delivery_started(attempt_id, notification.notification_type)
            .await;

        match self
            .providers
            .send(notification.recipient_id, &message, preferred.as_deref())
            .await
        {
            Ok(delivery) => {
                self.enhancement
                    .delivery_completed(
                        attempt_id,
                        Some(delivery.provider),
                        true,
                        delivery.response.duration_ms,
                    )
                    .await;
                tracing::debug!(
                    notification_id = %notification.id,
                    provider = delivery.provider,
                    duration_ms = delivery.response.duration_ms,
                    "Queued notification delivered"
                );
                self.queue.complete(notification).await
            }
            Err(e) => {
                self.enhancement
                    .delivery_completed(attempt_id, None, false, 0)
                    .await;
                let kind = e.kind;
                let now = Utc::now().naive_utc();
                self.queue.fail(notification, kind, now).await?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnhancementConfig;
    use crate::models::{
        DeliveryStatus, NotificationRequest, NotificationType, Priority,
    };
    use crate::providers::PushProvider;
    use crate::providers::ProviderResponse;
    use crate::queue::DurableStore;
    use crate::queue::durable::testing::FakeDurableStore;
    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FlakyProvider {
        calls: AtomicU64,
        fail_first: u64,
    }

    #[async_trait]
    impl PushProvider for FlakyProvider {
        async fn send(
            &self,
            _recipient_id: i64,
            _message: &PushMessage,
        ) -> Result<ProviderResponse, crate::error::DeliveryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(crate::error::DeliveryError::new(
                    crate::models::DeliveryErrorKind::ProviderUnavailable,
                    "down",
                ))
            } else {
                Ok(ProviderResponse {
                    status_code: 200,
                    duration_ms: 3,
                })
            }
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn test_config() -> QueueConfig {
        QueueConfig {
            memory_capacity: 100,
            hot_horizon_secs: 3600,
            drain_interval_secs: 30,
            drain_batch_size: 10,
            default_max_attempts: 5,
            retry_delay_cap_secs: 3600,
            cleanup_cron: "0 */5 * * * *".to_string(),
            retention_days: 30,
        }
    }

    fn enhancement() -> Arc<EnhancementLayer> {
        Arc::new(EnhancementLayer::new(
            EnhancementConfig {
                rate_limiting_enabled: false,
                content_filtering_enabled: false,
                metrics_enabled: true,
                audit_enabled: false,
                persist_audit_events: false,
                compression_threshold_bytes: 1024,
                metrics_buffer_size: 100,
                audit_buffer_size: 100,
                rate_limit: Default::default(),
            },
            None,
        ))
    }

    async fn worker_over(
        durable: Arc<dyn DurableStore>,
        fail_first: u64,
    ) -> (Arc<QueueWorker>, Arc<NotificationQueue>, Arc<EnhancementLayer>) {
        let queue = Arc::new(NotificationQueue::new(&test_config(), durable));
        let mut manager = ProviderManager::empty(
            5,
            Duration::from_secs(300),
            Duration::from_secs(10),
        );
        manager.register(Arc::new(FlakyProvider {
            calls: AtomicU64::new(0),
            fail_first,
        }));
        let enhancement = enhancement();
        let worker = Arc::new(
            QueueWorker::new(
                queue.clone(),
                Arc::new(manager),
                enhancement.clone(),
                test_config(),
                CancellationToken::new(),
            )
            .await
            .unwrap(),
        );
        (worker, queue, enhancement)
    }

    async fn worker_with(fail_first: u64) -> (Arc<QueueWorker>, Arc<NotificationQueue>, Arc<FakeDurableStore>) {
        let durable = Arc::new(FakeDurableStore::new());
        let (worker, queue, _) = worker_over(durable.clone(), fail_first).await;
        (worker, queue, durable)
    }

    fn request(recipient_id: i64) -> NotificationRequest {
        NotificationRequest::new(
            recipient_id,
            None,
            NotificationType::Message,
            "hi",
            "there",
            json!({}),
            Priority::Normal,
        )
    }

    #[tokio::test]
    async fn drain_pass_delivers_due_work() {
        let (worker, queue, durable) = worker_with(0).await;
        let id = queue.enqueue(request(1)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let drained = worker.drain_once().await.unwrap();
        assert_eq!(drained, 1);
        assert_eq!(durable.get(&id).unwrap().status, DeliveryStatus::Delivered);
    }

    #[tokio::test]
    async fn failed_attempt_reschedules_instead_of_completing() {
        let (worker, queue, durable) = worker_with(1).await;
        let id = queue.enqueue(request(1)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let drained = worker.drain_once().await.unwrap();
        assert_eq!(drained, 1);
        // Rescheduled 10s out (ProviderUnavailable base delay), back in memory.
        assert!(durable.get(&id).is_none());
        assert_eq!(queue.stats().await.unwrap().in_memory, 1);
    }

    /// Store that rejects every write; reads act empty.
    struct BrokenStore;

    #[async_trait]
    impl DurableStore for BrokenStore {
        async fn upsert(&self, _notification: &QueuedNotification) -> EngineResult<()> {
            Err(EngineError::Database {
                operation: "upsert queued notification".to_string(),
                source: anyhow::anyhow!("store offline"),
            })
        }

        async fn find_by_id(
            &self,
            _id: Uuid,
        ) -> EngineResult<Option<QueuedNotification>> {
            Ok(None)
        }

        async fn load_due(
            &self,
            _now: NaiveDateTime,
            _limit: i64,
        ) -> EngineResult<Vec<QueuedNotification>> {
            Ok(Vec::new())
        }

        async fn load_pending_for_recipient(
            &self,
            _recipient_id: i64,
        ) -> EngineResult<Vec<QueuedNotification>> {
            Ok(Vec::new())
        }

        async fn delete_by_id(&self, _id: Uuid) -> EngineResult<bool> {
            Ok(false)
        }

        async fn reset_failed(&self, _now: NaiveDateTime) -> EngineResult<u64> {
            Ok(0)
        }

        async fn mark_expired(&self, _now: NaiveDateTime) -> EngineResult<u64> {
            Ok(0)
        }

        async fn purge_terminal_before(&self, _cutoff: NaiveDateTime) -> EngineResult<u64> {
            Ok(0)
        }

        async fn count_by_status(&self, _status: DeliveryStatus) -> EngineResult<i64> {
            Ok(0)
        }
    }

    struct SharedCountProvider {
        calls: Arc<AtomicU64>,
    }

    #[async_trait]
    impl PushProvider for SharedCountProvider {
        async fn send(
            &self,
            _recipient_id: i64,
            _message: &PushMessage,
        ) -> Result<ProviderResponse, crate::error::DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderResponse {
                status_code: 200,
                duration_ms: 1,
            })
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn store_error_on_one_item_does_not_drop_rest_of_batch() {
        let calls = Arc::new(AtomicU64::new(0));
        let queue = Arc::new(NotificationQueue::new(&test_config(), Arc::new(BrokenStore)));
        let mut manager = ProviderManager::empty(
            5,
            Duration::from_secs(300),
            Duration::from_secs(10),
        );
        manager.register(Arc::new(SharedCountProvider {
            calls: calls.clone(),
        }));
        let worker = Arc::new(
            QueueWorker::new(
                queue.clone(),
                Arc::new(manager),
                enhancement(),
                test_config(),
                CancellationToken::new(),
            )
            .await
            .unwrap(),
        );

        queue.enqueue(request(1)).await.unwrap();
        queue.enqueue(request(2)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Finalizing the first item hits the broken store; the second
        // item must still be attempted rather than silently dropped.
        let drained = worker.drain_once().await.unwrap();
        assert_eq!(drained, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn queued_deliveries_are_recorded_in_metrics() {
        let durable = Arc::new(FakeDurableStore::new());
        let (worker, queue, enhancement) = worker_over(durable, 1).await;
        queue.enqueue(request(1)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        // First attempt fails and reschedules, the reconnect path succeeds.
        worker.drain_once().await.unwrap();
        worker.deliver_backlog(1).await.unwrap();

        let report = enhancement.metrics(chrono::Duration::seconds(60)).await;
        assert_eq!(report.total, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test]
    async fn backlog_delivery_skips_backoff() {
        let (worker, queue, durable) = worker_with(1).await;
        let id = queue.enqueue(request(9)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        worker.drain_once().await.unwrap();
        // Second drain pass sees nothing due, but the reconnect path does.
        assert_eq!(worker.drain_once().await.unwrap(), 0);
        let delivered = worker.deliver_backlog(9).await.unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(durable.get(&id).unwrap().status, DeliveryStatus::Delivered);
    }
}
