//! Notification intake: validation, policy checks and routing.
//!
//! The orchestrator is the single entry point for producers. It validates
//! a request against the app directory, runs the enhancement checks,
//! persists the in-app record, then either delivers immediately (recipient
//! online) or hands the work to the retry queue. Delivery failures are
//! never surfaced to callers.

pub mod collaborators;

pub use collaborators::{AppDirectory, OpenDirectory};

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use crate::enhancement::{EnhancementDecision, EnhancementLayer, RiskLevel};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AuditSeverity, NotificationRecord, NotificationRequest, NotificationType, Priority,
};
use crate::providers::{ProviderManager, PushMessage};
use crate::queue::{ConnectivityTracker, NotificationQueue};

/// What happened to a submitted notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Delivered immediately through the named provider
    Delivered { provider: &'static str },
    /// Accepted and queued for deferred delivery
    Queued { id: Uuid },
    /// Silently dropped (blocked relationship or recipient preferences)
    Suppressed { reason: &'static str },
    RateLimited,
    ContentRejected { risk: RiskLevel },
}

/// Per-outcome counters for a multicast submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct MulticastSummary {
    pub delivered: u64,
    pub queued: u64,
    pub suppressed: u64,
    pub rate_limited: u64,
    pub content_rejected: u64,
    pub not_found: u64,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Entry point wiring the directory, enhancement layer, providers and
/// queue together.
pub struct Orchestrator {
    directory: Arc<dyn AppDirectory>,
    providers: Arc<ProviderManager>,
    queue: Arc<NotificationQueue>,
    connectivity: Arc<ConnectivityTracker>,
    enhancement: Arc<EnhancementLayer>,
}

impl Orchestrator {
    pub fn new(
        directory: Arc<dyn AppDirectory>,
        providers: Arc<ProviderManager>,
        queue: Arc<NotificationQueue>,
        connectivity: Arc<ConnectivityTracker>,
        enhancement: Arc<EnhancementLayer>,
    ) -> Self {
        Self {
            directory,
            providers,
            queue,
            connectivity,
            enhancement,
        }
    }

    /// Submits one notification.
    ///
    /// Returns `Err` only for caller mistakes (unknown recipient,
    /// self-notification). Policy rejections are `Ok` outcomes and a
    /// failed immediate delivery is absorbed into the queue.
    pub async fn submit(&self, mut request: NotificationRequest) -> EngineResult<DeliveryOutcome> {
        if !self.directory.user_exists(request.recipient_id).await? {
            return Err(EngineError::RecipientNotFound {
                user_id: request.recipient_id,
            });
        }
        if request.actor_id == Some(request.recipient_id) {
            return Err(EngineError::SelfNotification {
                user_id: request.recipient_id,
            });
        }

        if request.notification_type.has_actor()
            && let Some(actor_id) = request.actor_id
            && self.directory.is_blocked(actor_id, request.recipient_id).await?
        {
            tracing::debug!(
                actor_id,
                recipient_id = request.recipient_id,
                "Notification suppressed, actor blocked by recipient"
            );
            return Ok(DeliveryOutcome::Suppressed { reason: "blocked" });
        }

        if !self
            .directory
            .notifications_allowed(request.recipient_id, request.notification_type)
            .await?
        {
            return Ok(DeliveryOutcome::Suppressed {
                reason: "preferences",
            });
        }

        match self
            .enhancement
            .should_allow(
                request.recipient_id,
                request.notification_type,
                &request.title,
                &request.body,
            )
            .await?
        {
            EnhancementDecision::Allow { title, body } => {
                request.title = title;
                request.body = body;
            }
            EnhancementDecision::RateLimited => return Ok(DeliveryOutcome::RateLimited),
            EnhancementDecision::ContentRejected { risk } => {
                return Ok(DeliveryOutcome::ContentRejected { risk });
            }
        }

        // The in-app record persists regardless of channel delivery.
        self.directory
            .persist_notification_record(&NotificationRecord::from(&request))
            .await?;

        self.deliver_or_queue(request).await
    }

    /// Immediate delivery for online recipients, queue handoff otherwise.
    ///
    /// Large payloads are rewritten into their gzip transport envelope
    /// here, before the immediate send and before any queue handoff, so
    /// retries carry the same wire form.
    async fn deliver_or_queue(
        &self,
        mut request: NotificationRequest,
    ) -> EngineResult<DeliveryOutcome> {
        let compressed = self.enhancement.compress_payload(&request.payload)?;
        if compressed.compressed {
            tracing::debug!(
                recipient_id = request.recipient_id,
                original_bytes = compressed.original_size,
                compressed_bytes = compressed.bytes.len(),
                "Large payload compressed for delivery"
            );
            request.payload = compressed.transport_value(&request.payload);
        }

        if self.connectivity.is_online(request.recipient_id) {
            let attempt_id = Uuid::new_v4();
            self.enhancement
                .delivery_started(attempt_id, request.notification_type)
                .await;

            let message = PushMessage::from(&request);
            match self
                .providers
                .send(
                    request.recipient_id,
                    &message,
                    request.preferred_provider.as_deref(),
                )
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
                    return Ok(DeliveryOutcome::Delivered {
                        provider: delivery.provider,
                    });
                }
                Err(e) => {
                    self.enhancement
                        .delivery_completed(attempt_id, None, false, 0)
                        .await;
                    tracing::debug!(
                        recipient_id = request.recipient_id,
                        error = %e,
                        "Immediate delivery failed, queueing for retry"
                    );
                }
            }
        }

        let id = self.queue.enqueue(request.clone()).await?;
        self.enhancement
            .record_audit(
                Some(request.recipient_id),
                "notification_queued",
                AuditSeverity::Low,
                json!({
                    "notification_id": id,
                    "notification_type": request.notification_type.as_str(),
                }),
            )
            .await?;
        Ok(DeliveryOutcome::Queued { id })
    }

    /// Submits one payload to many recipients.
    ///
    /// Per-recipient validation and policy checks run first; the online
    /// cohort goes out as a single provider multicast, everyone else (and
    /// every failed recipient) is queued individually. The template's
    /// `recipient_id` is ignored.
    pub async fn submit_multicast(
        &self,
        recipient_ids: &[i64],
        template: NotificationRequest,
    ) -> EngineResult<MulticastSummary> {
        let mut summary = MulticastSummary::default();
        let mut eligible: Vec<i64> = Vec::with_capacity(recipient_ids.len());
        let mut sanitized: Option<(String, String)> = None;

        for &recipient_id in recipient_ids {
            if !self.directory.user_exists(recipient_id).await?
                || template.actor_id == Some(recipient_id)
            {
                summary.not_found += 1;
                continue;
            }
            if template.notification_type.has_actor()
                && let Some(actor_id) = template.actor_id
                && self.directory.is_blocked(actor_id, recipient_id).await?
            {
                summary.suppressed += 1;
                continue;
            }
            if !self
                .directory
                .notifications_allowed(recipient_id, template.notification_type)
                .await?
            {
                summary.suppressed += 1;
                continue;
            }

            match self
                .enhancement
                .should_allow(
                    recipient_id,
                    template.notification_type,
                    &template.title,
                    &template.body,
                )
                .await?
            {
                EnhancementDecision::Allow { title, body } => {
                    sanitized.get_or_insert((title, body));
                }
                EnhancementDecision::RateLimited => {
                    summary.rate_limited += 1;
                    continue;
                }
                EnhancementDecision::ContentRejected { .. } => {
                    summary.content_rejected += 1;
                    continue;
                }
            }
            eligible.push(recipient_id);
        }

        if eligible.is_empty() {
            return Ok(summary);
        }

        let (title, body) = sanitized.unwrap_or((template.title.clone(), template.body.clone()));
        let per_recipient = |recipient_id: i64| {
            let mut request = template.clone();
            request.recipient_id = recipient_id;
            request.title = title.clone();
            request.body = body.clone();
            request
        };

        for &recipient_id in &eligible {
            self.directory
                .persist_notification_record(&NotificationRecord::from(&per_recipient(
                    recipient_id,
                )))
                .await?;
        }

        let (online, offline) = self.connectivity.partition_online(&eligible);
        let mut to_queue = offline;

        if !online.is_empty() {
            let message = PushMessage::from(&per_recipient(online[0]));
            match self
                .providers
                .send_multicast(&online, &message, template.preferred_provider.as_deref())
                .await
            {
                Ok(outcome) => {
                    let failed = outcome.failed_recipients();
                    summary.delivered += (online.len() - failed.len()) as u64;
                    to_queue.extend(failed);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Multicast delivery failed, queueing cohort");
                    to_queue.extend(online);
                }
            }
        }

        for recipient_id in to_queue {
            self.queue.enqueue(per_recipient(recipient_id)).await?;
            summary.queued += 1;
        }

        tracing::info!(
            recipients = recipient_ids.len(),
            delivered = summary.delivered,
            queued = summary.queued,
            suppressed = summary.suppressed,
            "Multicast submission processed"
        );
        Ok(summary)
    }

    // ========================================================================
    // Typed wrappers
    // ========================================================================

    pub async fn notify_mention(
        &self,
        recipient_id: i64,
        actor_id: i64,
        actor_name: &str,
        post_id: i64,
    ) -> EngineResult<DeliveryOutcome> {
        self.submit(NotificationRequest::new(
            recipient_id,
            Some(actor_id),
            NotificationType::Mention,
            "You were mentioned",
            format!("{actor_name} mentioned you in a post"),
            json!({"post_id": post_id, "actor_name": actor_name}),
            Priority::High,
        ))
        .await
    }

    pub async fn notify_like(
        &self,
        recipient_id: i64,
        actor_id: i64,
        actor_name: &str,
        post_id: i64,
    ) -> EngineResult<DeliveryOutcome> {
        self.submit(NotificationRequest::new(
            recipient_id,
            Some(actor_id),
            NotificationType::Like,
            "New like",
            format!("{actor_name} liked your post"),
            json!({"post_id": post_id, "actor_name": actor_name}),
            Priority::Low,
        ))
        .await
    }

    pub async fn notify_follow(
        &self,
        recipient_id: i64,
        actor_id: i64,
        actor_name: &str,
    ) -> EngineResult<DeliveryOutcome> {
        self.submit(NotificationRequest::new(
            recipient_id,
            Some(actor_id),
            NotificationType::Follow,
            "New follower",
            format!("{actor_name} started following you"),
            json!({"actor_name": actor_name}),
            Priority::Normal,
        ))
        .await
    }

    pub async fn notify_comment(
        &self,
        recipient_id: i64,
        actor_id: i64,
        actor_name: &str,
        post_id: i64,
        preview: &str,
    ) -> EngineResult<DeliveryOutcome> {
        self.submit(NotificationRequest::new(
            recipient_id,
            Some(actor_id),
            NotificationType::Comment,
            "New comment",
            format!("{actor_name} commented: {preview}"),
            json!({"post_id": post_id, "actor_name": actor_name}),
            Priority::Normal,
        ))
        .await
    }

    pub async fn notify_message(
        &self,
        recipient_id: i64,
        sender_id: i64,
        sender_name: &str,
        preview: &str,
    ) -> EngineResult<DeliveryOutcome> {
        self.submit(NotificationRequest::new(
            recipient_id,
            Some(sender_id),
            NotificationType::Message,
            format!("Message from {sender_name}"),
            preview,
            json!({"sender_id": sender_id}),
            Priority::High,
        ))
        .await
    }

    pub async fn notify_system(
        &self,
        recipient_id: i64,
        title: &str,
        body: &str,
        payload: JsonValue,
    ) -> EngineResult<DeliveryOutcome> {
        self.submit(NotificationRequest::new(
            recipient_id,
            None,
            NotificationType::System,
            title,
            body,
            payload,
            Priority::Normal,
        ))
        .await
    }

    pub async fn notify_moderation(
        &self,
        recipient_id: i64,
        reason: &str,
    ) -> EngineResult<DeliveryOutcome> {
        self.submit(NotificationRequest::new(
            recipient_id,
            None,
            NotificationType::Moderation,
            "Moderation notice",
            reason,
            json!({"reason": reason}),
            Priority::Critical,
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::collaborators::testing::StubDirectory;
    use super::*;
    use crate::config::{EnhancementConfig, QueueConfig};
    use crate::error::DeliveryError;
    use crate::models::{ConnectionChannel, DeliveryErrorKind};
    use crate::providers::PushProvider;
    use crate::providers::ProviderResponse;
    use crate::queue::durable::testing::FakeDurableStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StaticProvider {
        succeed: bool,
    }

    #[async_trait]
    impl PushProvider for StaticProvider {
        async fn send(
            &self,
            _recipient_id: i64,
            _message: &PushMessage,
        ) -> Result<ProviderResponse, DeliveryError> {
            if self.succeed {
                Ok(ProviderResponse {
                    status_code: 200,
                    duration_ms: 4,
                })
            } else {
                Err(DeliveryError::new(
                    DeliveryErrorKind::ProviderUnavailable,
                    "down",
                ))
            }
        }

        fn name(&self) -> &'static str {
            "static"
        }
    }

    struct Fixture {
        orchestrator: Orchestrator,
        directory: Arc<StubDirectory>,
        connectivity: Arc<ConnectivityTracker>,
        queue: Arc<NotificationQueue>,
    }

    fn fixture(directory: StubDirectory, provider_succeeds: bool) -> Fixture {
        let directory = Arc::new(directory);
        let mut manager =
            ProviderManager::empty(5, Duration::from_secs(300), Duration::from_secs(10));
        manager.register(Arc::new(StaticProvider {
            succeed: provider_succeeds,
        }));

        let queue_config = QueueConfig {
            memory_capacity: 100,
            hot_horizon_secs: 3600,
            drain_interval_secs: 30,
            drain_batch_size: 100,
            default_max_attempts: 5,
            retry_delay_cap_secs: 3600,
            cleanup_cron: "0 */5 * * * *".to_string(),
            retention_days: 30,
        };
        let queue = Arc::new(NotificationQueue::new(
            &queue_config,
            Arc::new(FakeDurableStore::new()),
        ));
        let connectivity = Arc::new(ConnectivityTracker::new());
        let enhancement = Arc::new(EnhancementLayer::new(
            EnhancementConfig {
                persist_audit_events: false,
                ..Default::default()
            },
            None,
        ));

        Fixture {
            orchestrator: Orchestrator::new(
                directory.clone(),
                Arc::new(manager),
                queue.clone(),
                connectivity.clone(),
                enhancement,
            ),
            directory,
            connectivity,
            queue,
        }
    }

    fn request(recipient_id: i64, actor_id: Option<i64>) -> NotificationRequest {
        NotificationRequest::new(
            recipient_id,
            actor_id,
            NotificationType::Comment,
            "New comment",
            "nice post",
            json!({}),
            Priority::Normal,
        )
    }

    #[tokio::test]
    async fn unknown_recipient_is_an_error() {
        let f = fixture(StubDirectory::with_users(&[1]), true);
        let result = f.orchestrator.submit(request(99, Some(1))).await;
        assert!(matches!(
            result,
            Err(EngineError::RecipientNotFound { user_id: 99 })
        ));
    }

    #[tokio::test]
    async fn self_notification_is_an_error() {
        let f = fixture(StubDirectory::with_users(&[1]), true);
        let result = f.orchestrator.submit(request(1, Some(1))).await;
        assert!(matches!(
            result,
            Err(EngineError::SelfNotification { user_id: 1 })
        ));
    }

    #[tokio::test]
    async fn blocked_actor_is_suppressed_not_an_error() {
        let f = fixture(StubDirectory::with_users(&[1, 2]).block(2, 1), true);
        let outcome = f.orchestrator.submit(request(1, Some(2))).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Suppressed { reason: "blocked" });
        assert_eq!(f.directory.recorded(), 0);
    }

    #[tokio::test]
    async fn muted_type_is_suppressed_by_preferences() {
        let f = fixture(
            StubDirectory::with_users(&[1, 2]).mute(1, NotificationType::Comment),
            true,
        );
        let outcome = f.orchestrator.submit(request(1, Some(2))).await.unwrap();
        assert_eq!(
            outcome,
            DeliveryOutcome::Suppressed {
                reason: "preferences"
            }
        );
    }

    #[tokio::test]
    async fn online_recipient_gets_immediate_delivery() {
        let f = fixture(StubDirectory::with_users(&[1, 2]), true);
        f.connectivity.mark_online(1, ConnectionChannel::Web);

        let outcome = f.orchestrator.submit(request(1, Some(2))).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered { provider: "static" });
        assert_eq!(f.directory.recorded(), 1);
    }

    #[tokio::test]
    async fn offline_recipient_is_queued_with_record_persisted() {
        let f = fixture(StubDirectory::with_users(&[1, 2]), true);
        let outcome = f.orchestrator.submit(request(1, Some(2))).await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Queued { .. }));
        assert_eq!(f.directory.recorded(), 1);
        assert_eq!(f.queue.stats().await.unwrap().in_memory, 1);
    }

    #[tokio::test]
    async fn failed_immediate_delivery_falls_back_to_queue() {
        let f = fixture(StubDirectory::with_users(&[1, 2]), false);
        f.connectivity.mark_online(1, ConnectionChannel::Web);

        let outcome = f.orchestrator.submit(request(1, Some(2))).await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Queued { .. }));
    }

    #[tokio::test]
    async fn phishing_body_is_rejected() {
        let f = fixture(StubDirectory::with_users(&[1, 2]), true);
        let mut req = request(1, Some(2));
        req.body = "please verify your account now".to_string();

        let outcome = f.orchestrator.submit(req).await.unwrap();
        assert_eq!(
            outcome,
            DeliveryOutcome::ContentRejected {
                risk: RiskLevel::Critical
            }
        );
        assert_eq!(f.directory.recorded(), 0);
    }

    #[tokio::test]
    async fn burst_of_submissions_hits_rate_limit() {
        let f = fixture(StubDirectory::with_users(&[1, 2]), true);
        for _ in 0..5 {
            f.orchestrator.submit(request(1, Some(2))).await.unwrap();
        }
        let outcome = f.orchestrator.submit(request(1, Some(2))).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::RateLimited);
    }

    #[tokio::test]
    async fn sanitized_text_reaches_the_record() {
        let f = fixture(StubDirectory::with_users(&[1, 2]), true);
        let mut req = request(1, Some(2));
        req.title = "New <b>comment</b>".to_string();
        f.orchestrator.submit(req).await.unwrap();

        let records = f.directory.records.lock().unwrap();
        assert_eq!(records[0].title, "New comment");
    }

    #[tokio::test]
    async fn multicast_splits_online_and_offline_cohorts() {
        let f = fixture(StubDirectory::with_users(&[1, 2, 3, 4]), true);
        f.connectivity.mark_online(1, ConnectionChannel::Web);
        f.connectivity.mark_online(2, ConnectionChannel::Mobile);

        let summary = f
            .orchestrator
            .submit_multicast(&[1, 2, 3], request(0, Some(4)))
            .await
            .unwrap();
        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.queued, 1);
        assert_eq!(f.directory.recorded(), 3);
    }

    #[tokio::test]
    async fn multicast_counts_per_recipient_policy_outcomes() {
        let f = fixture(
            StubDirectory::with_users(&[1, 2, 9]).block(9, 2),
            true,
        );

        let summary = f
            .orchestrator
            .submit_multicast(&[1, 2, 7], request(0, Some(9)))
            .await
            .unwrap();
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.suppressed, 1);
        assert_eq!(summary.queued, 1);
    }

    struct CapturingProvider {
        last_payload: std::sync::Mutex<Option<JsonValue>>,
    }

    #[async_trait]
    impl PushProvider for CapturingProvider {
        async fn send(
            &self,
            _recipient_id: i64,
            message: &PushMessage,
        ) -> Result<ProviderResponse, DeliveryError> {
            *self.last_payload.lock().unwrap() = Some(message.payload.clone());
            Ok(ProviderResponse {
                status_code: 200,
                duration_ms: 2,
            })
        }

        fn name(&self) -> &'static str {
            "capturing"
        }
    }

    fn capturing_fixture() -> (Fixture, Arc<CapturingProvider>) {
        let provider = Arc::new(CapturingProvider {
            last_payload: std::sync::Mutex::new(None),
        });
        let mut f = fixture(StubDirectory::with_users(&[1, 2]), true);
        let mut manager =
            ProviderManager::empty(5, Duration::from_secs(300), Duration::from_secs(10));
        manager.register(provider.clone());
        f.orchestrator.providers = Arc::new(manager);
        (f, provider)
    }

    #[tokio::test]
    async fn large_payload_is_delivered_as_gzip_envelope() {
        let (f, provider) = capturing_fixture();
        f.connectivity.mark_online(1, ConnectionChannel::Web);

        let original = json!({"body": "notification body ".repeat(200)});
        let mut req = request(1, Some(2));
        req.payload = original.clone();

        let outcome = f.orchestrator.submit(req).await.unwrap();
        assert_eq!(
            outcome,
            DeliveryOutcome::Delivered {
                provider: "capturing"
            }
        );

        let sent = provider.last_payload.lock().unwrap().clone().unwrap();
        assert_eq!(sent["encoding"], "gzip");
        let restored = crate::enhancement::payload_from_transport(&sent).unwrap();
        assert_eq!(restored, original);
    }

    #[tokio::test]
    async fn small_payload_is_delivered_unwrapped() {
        let (f, provider) = capturing_fixture();
        f.connectivity.mark_online(1, ConnectionChannel::Web);

        let original = json!({"post_id": 7});
        let mut req = request(1, Some(2));
        req.payload = original.clone();

        f.orchestrator.submit(req).await.unwrap();
        let sent = provider.last_payload.lock().unwrap().clone().unwrap();
        assert_eq!(sent, original);
    }

    #[tokio::test]
    async fn queued_large_payload_keeps_its_envelope() {
        let f = fixture(StubDirectory::with_users(&[1, 2]), true);

        let original = json!({"body": "notification body ".repeat(200)});
        let mut req = request(1, Some(2));
        req.payload = original.clone();

        let outcome = f.orchestrator.submit(req).await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Queued { .. }));

        let now = chrono::Utc::now().naive_utc() + chrono::Duration::seconds(1);
        let queued = f.queue.drain_due(now, 10).await.unwrap();
        assert_eq!(queued[0].payload["encoding"], "gzip");
        let restored =
            crate::enhancement::payload_from_transport(&queued[0].payload).unwrap();
        assert_eq!(restored, original);
    }

    #[tokio::test]
    async fn typed_wrapper_builds_critical_moderation_notice() {
        let f = fixture(StubDirectory::with_users(&[1]), true);
        let outcome = f
            .orchestrator
            .notify_moderation(1, "Post removed for spam")
            .await
            .unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Queued { .. }));

        let now = chrono::Utc::now().naive_utc() + chrono::Duration::seconds(1);
        let queued = f.queue.drain_due(now, 10).await.unwrap();
        assert_eq!(queued[0].priority, Priority::Critical);
        assert_eq!(queued[0].notification_type, NotificationType::Moderation);
    }
}
