//! Cross-cutting policy layer around notification delivery.
//!
//! Rate limiting, content filtering, metrics, auditing and payload
//! compression, each independently toggleable. Disabled features
//! short-circuit to allow/no-op so the orchestrator's control flow never
//! depends on configuration.

pub mod audit;
pub mod compression;
pub mod content_filter;
pub mod metrics;
pub mod rate_limit;

pub use audit::AuditLogger;
pub use compression::{
    CompressedPayload, compress_payload, decompress_payload, payload_from_transport,
};
pub use content_filter::{ContentFilter, FilterVerdict, RiskLevel};
pub use metrics::{MetricsCollector, MetricsReport, NotificationEvent};
pub use rate_limit::{RateLimitDecision, RateLimiter};

use chrono::Duration;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use crate::config::EnhancementConfig;
use crate::error::EngineResult;
use crate::models::{AuditSeverity, NotificationType};
use crate::repositories::AuditEventRepository;

/// Verdict on whether a notification may proceed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnhancementDecision {
    /// Proceed with (possibly sanitized) text
    Allow { title: String, body: String },
    RateLimited,
    ContentRejected { risk: RiskLevel },
}

/// Health snapshot of the enhancement layer
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct EnhancementHealthReport {
    pub rate_limiting_enabled: bool,
    pub content_filtering_enabled: bool,
    pub metrics_enabled: bool,
    pub audit_enabled: bool,
    pub blocked_users: usize,
    pub buffered_audit_events: usize,
    pub metrics_last_hour: MetricsReport,
}

/// Facade over all enhancement features.
pub struct EnhancementLayer {
    config: EnhancementConfig,
    rate_limiter: RateLimiter,
    filter: ContentFilter,
    metrics: MetricsCollector,
    audit: AuditLogger,
}

impl EnhancementLayer {
    pub fn new(config: EnhancementConfig, audit_repository: Option<AuditEventRepository>) -> Self {
        let repository = if config.persist_audit_events {
            audit_repository
        } else {
            None
        };
        Self {
            rate_limiter: RateLimiter::new(config.rate_limit.clone()),
            filter: ContentFilter::new(),
            metrics: MetricsCollector::new(config.metrics_buffer_size),
            audit: AuditLogger::new(config.audit_buffer_size, repository),
            config,
        }
    }

    /// Runs the pre-delivery checks for one notification.
    ///
    /// Rate limiting is checked before content so a flooding user pays no
    /// filtering cost. Both checks no-op when disabled.
    pub async fn should_allow(
        &self,
        user_id: i64,
        notification_type: NotificationType,
        title: &str,
        body: &str,
    ) -> EngineResult<EnhancementDecision> {
        if self.config.rate_limiting_enabled {
            match self.rate_limiter.check(user_id, notification_type) {
                RateLimitDecision::Allowed => {}
                RateLimitDecision::Limited { tier, escalated } => {
                    let (event_type, severity) = if escalated {
                        ("rate_limit_block", AuditSeverity::High)
                    } else {
                        ("rate_limit_violation", AuditSeverity::Medium)
                    };
                    self.record_audit(
                        Some(user_id),
                        event_type,
                        severity,
                        json!({
                            "tier": tier,
                            "notification_type": notification_type.as_str(),
                        }),
                    )
                    .await?;
                    return Ok(EnhancementDecision::RateLimited);
                }
                RateLimitDecision::Blocked { remaining } => {
                    tracing::debug!(
                        user_id,
                        remaining_secs = remaining.as_secs(),
                        "Submission rejected, user under rate limit block"
                    );
                    return Ok(EnhancementDecision::RateLimited);
                }
            }
        }

        if !self.config.content_filtering_enabled {
            return Ok(EnhancementDecision::Allow {
                title: title.to_string(),
                body: body.to_string(),
            });
        }

        let combined = format!("{title}\n{body}");
        let verdict = self.filter.analyze(&combined);
        if verdict.risk.is_blocking() {
            self.record_audit(
                Some(user_id),
                "content_blocked",
                match verdict.risk {
                    RiskLevel::Critical => AuditSeverity::Critical,
                    _ => AuditSeverity::High,
                },
                json!({
                    "risk": verdict.risk.as_str(),
                    "matched": verdict.matched,
                    "notification_type": notification_type.as_str(),
                }),
            )
            .await?;
            return Ok(EnhancementDecision::ContentRejected { risk: verdict.risk });
        }

        Ok(EnhancementDecision::Allow {
            title: self.filter.sanitize(title),
            body: self.filter.sanitize(body),
        })
    }

    /// Records an audit event unless auditing is disabled.
    pub async fn record_audit(
        &self,
        user_id: Option<i64>,
        event_type: &str,
        severity: AuditSeverity,
        details: JsonValue,
    ) -> EngineResult<()> {
        if !self.config.audit_enabled {
            return Ok(());
        }
        self.audit.record(user_id, event_type, severity, details).await
    }

    /// Marks the start of a delivery attempt for metric aggregation.
    pub async fn delivery_started(&self, id: Uuid, notification_type: NotificationType) {
        if self.config.metrics_enabled {
            self.metrics.delivery_started(id, notification_type).await;
        }
    }

    /// Marks the outcome of a delivery attempt.
    pub async fn delivery_completed(
        &self,
        id: Uuid,
        provider: Option<&'static str>,
        success: bool,
        latency_ms: u64,
    ) {
        if self.config.metrics_enabled {
            self.metrics
                .delivery_completed(id, provider, success, latency_ms)
                .await;
        }
    }

    pub async fn metrics(&self, window: Duration) -> MetricsReport {
        self.metrics.metrics(window).await
    }

    /// Serializes a payload, gzipping above the configured threshold.
    pub fn compress_payload(&self, payload: &JsonValue) -> EngineResult<CompressedPayload> {
        compression::compress_payload(payload, self.config.compression_threshold_bytes)
    }

    pub async fn health_report(&self) -> EnhancementHealthReport {
        EnhancementHealthReport {
            rate_limiting_enabled: self.config.rate_limiting_enabled,
            content_filtering_enabled: self.config.content_filtering_enabled,
            metrics_enabled: self.config.metrics_enabled,
            audit_enabled: self.config.audit_enabled,
            blocked_users: self.rate_limiter.blocked_user_count(),
            buffered_audit_events: self.audit.buffered().await,
            metrics_last_hour: self.metrics.metrics(Duration::hours(1)).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EnhancementConfig {
        EnhancementConfig {
            rate_limiting_enabled: true,
            content_filtering_enabled: true,
            metrics_enabled: true,
            audit_enabled: true,
            persist_audit_events: false,
            compression_threshold_bytes: 1024,
            metrics_buffer_size: 100,
            audit_buffer_size: 100,
            rate_limit: Default::default(),
        }
    }

    #[tokio::test]
    async fn clean_submission_is_allowed_sanitized() {
        let layer = EnhancementLayer::new(config(), None);
        let decision = layer
            .should_allow(1, NotificationType::Comment, "New <b>comment</b>", "nice post")
            .await
            .unwrap();
        assert_eq!(
            decision,
            EnhancementDecision::Allow {
                title: "New comment".to_string(),
                body: "nice post".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn phishing_content_is_rejected_with_audit() {
        let layer = EnhancementLayer::new(config(), None);
        let decision = layer
            .should_allow(
                1,
                NotificationType::Message,
                "Security alert",
                "verify your account at bit.ly/x",
            )
            .await
            .unwrap();
        assert_eq!(
            decision,
            EnhancementDecision::ContentRejected {
                risk: RiskLevel::Critical
            }
        );

        let recent = layer.audit.recent(1).await;
        assert_eq!(recent[0].event_type, "content_blocked");
        assert_eq!(recent[0].severity, AuditSeverity::Critical);
    }

    #[tokio::test]
    async fn rate_limit_violation_is_audited() {
        let layer = EnhancementLayer::new(config(), None);
        for _ in 0..5 {
            layer
                .should_allow(1, NotificationType::Like, "t", "b")
                .await
                .unwrap();
        }
        let decision = layer
            .should_allow(1, NotificationType::Like, "t", "b")
            .await
            .unwrap();
        assert_eq!(decision, EnhancementDecision::RateLimited);

        let recent = layer.audit.recent(1).await;
        assert_eq!(recent[0].event_type, "rate_limit_violation");
    }

    #[tokio::test]
    async fn disabled_features_short_circuit_to_allow() {
        let layer = EnhancementLayer::new(
            EnhancementConfig {
                rate_limiting_enabled: false,
                content_filtering_enabled: false,
                ..config()
            },
            None,
        );

        // Would be both rate limited and content rejected if enabled.
        for _ in 0..20 {
            let decision = layer
                .should_allow(
                    1,
                    NotificationType::Message,
                    "verify your account",
                    "<script>x</script>",
                )
                .await
                .unwrap();
            assert_eq!(
                decision,
                EnhancementDecision::Allow {
                    title: "verify your account".to_string(),
                    body: "<script>x</script>".to_string(),
                }
            );
        }
    }

    #[tokio::test]
    async fn health_report_reflects_configuration() {
        let layer = EnhancementLayer::new(config(), None);
        layer
            .record_audit(None, "startup", AuditSeverity::Low, serde_json::json!({}))
            .await
            .unwrap();

        let report = layer.health_report().await;
        assert!(report.rate_limiting_enabled);
        assert_eq!(report.buffered_audit_events, 1);
        assert_eq!(report.blocked_users, 0);
    }
}
