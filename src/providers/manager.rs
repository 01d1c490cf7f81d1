//! Health-aware provider registry and fallback.
//!
//! The manager tries providers in priority order, skipping any whose
//! circuit is open, and moves to the next provider on a classified send
//! failure. Health counters live in a DashMap keyed by provider name;
//! mutations happen under the per-entry lock and never across an await.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::config::ProvidersConfig;
use crate::error::DeliveryError;
use crate::models::DeliveryErrorKind;
use crate::providers::apns::ApnsProvider;
use crate::providers::circuit::CircuitBreaker;
use crate::providers::fcm::FcmProvider;
use crate::providers::health::{ProviderHealth, ProviderHealthReport};
use crate::providers::provider::{
    PushMessage, PushProvider, ProviderResponse, RecipientDelivery,
};
use crate::providers::web_push::WebPushProvider;

/// A successful send together with the provider that carried it
#[derive(Debug)]
pub struct ManagedDelivery {
    pub provider: &'static str,
    pub response: ProviderResponse,
}

/// Aggregate result of a multicast send
#[derive(Debug)]
pub struct MulticastOutcome {
    pub provider: &'static str,
    pub deliveries: Vec<RecipientDelivery>,
}

impl MulticastOutcome {
    /// A multicast counts as successful when at least one recipient got
    /// the message.
    pub fn any_succeeded(&self) -> bool {
        self.deliveries.iter().any(|d| d.result.is_ok())
    }

    pub fn failed_recipients(&self) -> Vec<i64> {
        self.deliveries
            .iter()
            .filter(|d| d.result.is_err())
            .map(|d| d.recipient_id)
            .collect()
    }
}

/// Provider registry with per-provider circuit breakers
pub struct ProviderManager {
    /// Registered providers in priority order; lower index is tried first
    providers: Vec<Arc<dyn PushProvider>>,
    health: DashMap<&'static str, ProviderHealth>,
    send_timeout: Duration,
    failure_threshold: u32,
    cooldown: Duration,
}

impl ProviderManager {
    /// Builds the manager from configuration, registering enabled
    /// providers in fixed priority order: web push, then FCM, then APNs.
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let mut manager = Self::empty(
            config.circuit_failure_threshold,
            Duration::from_secs(config.circuit_cooldown_secs),
            Duration::from_secs(config.send_timeout_secs),
        );

        if config.web_push.enabled {
            manager.register(Arc::new(WebPushProvider::new(config.web_push.clone())));
        }
        if config.fcm.enabled {
            manager.register(Arc::new(FcmProvider::new(config.fcm.clone())));
        }
        if config.apns.enabled {
            manager.register(Arc::new(ApnsProvider::new(config.apns.clone())));
        }

        manager
    }

    /// An empty manager; used by `from_config` and directly by tests.
    pub fn empty(failure_threshold: u32, cooldown: Duration, send_timeout: Duration) -> Self {
        Self {
            providers: Vec::new(),
            health: DashMap::new(),
            send_timeout,
            failure_threshold,
            cooldown,
        }
    }

    /// Registers a provider at the next priority slot.
    pub fn register(&mut self, provider: Arc<dyn PushProvider>) {
        let name = provider.name();
        let priority = self.providers.len();
        self.health.insert(
            name,
            ProviderHealth::new(
                name,
                priority,
                CircuitBreaker::new(self.failure_threshold, self.cooldown),
            ),
        );
        self.providers.push(provider);
        tracing::info!(provider = name, priority, "Push provider registered");
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Providers in try-order: preferred first when named and available,
    /// then the rest by registration priority.
    fn candidates(&self, preferred: Option<&str>) -> Vec<Arc<dyn PushProvider>> {
        let mut ordered: Vec<Arc<dyn PushProvider>> = Vec::with_capacity(self.providers.len());
        if let Some(name) = preferred
            && let Some(provider) = self.providers.iter().find(|p| p.name() == name)
            && provider.is_available()
        {
            ordered.push(Arc::clone(provider));
        }
        for provider in &self.providers {
            if Some(provider.name()) == preferred || !provider.is_available() {
                continue;
            }
            ordered.push(Arc::clone(provider));
        }
        ordered
    }

    /// Whether the provider's circuit admits a request right now.
    ///
    /// The entry guard is dropped before any await.
    fn circuit_admits(&self, name: &'static str) -> bool {
        self.health
            .get_mut(name)
            .map(|mut entry| entry.circuit.allows_request())
            .unwrap_or(false)
    }

    fn record_success(&self, name: &'static str, latency_ms: u64) {
        if let Some(mut entry) = self.health.get_mut(name) {
            entry.record_success(latency_ms);
        }
    }

    fn record_failure(&self, name: &'static str) {
        if let Some(mut entry) = self.health.get_mut(name) {
            entry.record_failure();
        }
    }

    /// One send against one provider under the configured deadline.
    async fn timed_send(
        &self,
        provider: &Arc<dyn PushProvider>,
        recipient_id: i64,
        message: &PushMessage,
    ) -> Result<ProviderResponse, DeliveryError> {
        match tokio::time::timeout(self.send_timeout, provider.send(recipient_id, message)).await
        {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::timeout(
                provider.name(),
                self.send_timeout.as_secs(),
            )),
        }
    }

    /// Sends to one recipient, falling back through providers in priority
    /// order. Providers with an open circuit are skipped without an
    /// attempt. The error of the last tried provider is returned when all
    /// candidates fail.
    pub async fn send(
        &self,
        recipient_id: i64,
        message: &PushMessage,
        preferred: Option<&str>,
    ) -> Result<ManagedDelivery, DeliveryError> {
        let mut last_error: Option<DeliveryError> = None;

        for provider in self.candidates(preferred) {
            let name = provider.name();
            if !self.circuit_admits(name) {
                tracing::debug!(provider = name, "Circuit open, skipping provider");
                continue;
            }

            match self.timed_send(&provider, recipient_id, message).await {
                Ok(response) => {
                    self.record_success(name, response.duration_ms);
                    return Ok(ManagedDelivery {
                        provider: name,
                        response,
                    });
                }
                Err(error) => {
                    self.record_failure(name);
                    tracing::warn!(
                        provider = name,
                        recipient_id,
                        error = %error,
                        "Provider send failed, trying next"
                    );
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DeliveryError::new(
                DeliveryErrorKind::ProviderUnavailable,
                "no push provider available",
            )
        }))
    }

    /// Sends to many recipients through the first admitted provider.
    ///
    /// Uses the provider's native batch endpoint when it has one,
    /// otherwise fans out concurrently with the per-send deadline applied
    /// to each recipient. Health records one success when any recipient
    /// succeeded, one failure when the whole batch failed.
    pub async fn send_multicast(
        &self,
        recipient_ids: &[i64],
        message: &PushMessage,
        preferred: Option<&str>,
    ) -> Result<MulticastOutcome, DeliveryError> {
        let provider = self
            .candidates(preferred)
            .into_iter()
            .find(|p| self.circuit_admits(p.name()))
            .ok_or_else(|| {
                DeliveryError::new(
                    DeliveryErrorKind::ProviderUnavailable,
                    "no push provider available",
                )
            })?;
        let name = provider.name();

        let deliveries = if provider.supports_multicast() {
            let batch_deadline = self.send_timeout;
            match tokio::time::timeout(
                batch_deadline,
                provider.send_multicast(recipient_ids, message),
            )
            .await
            {
                Ok(deliveries) => deliveries,
                Err(_) => {
                    let error = DeliveryError::timeout(name, batch_deadline.as_secs());
                    recipient_ids
                        .iter()
                        .map(|&recipient_id| RecipientDelivery {
                            recipient_id,
                            result: Err(error.clone()),
                        })
                        .collect()
                }
            }
        } else {
            let sends = recipient_ids.iter().map(|&recipient_id| {
                let provider = Arc::clone(&provider);
                async move {
                    RecipientDelivery {
                        recipient_id,
                        result: self.timed_send(&provider, recipient_id, message).await,
                    }
                }
            });
            futures::future::join_all(sends).await
        };

        let outcome = MulticastOutcome {
            provider: name,
            deliveries,
        };

        if outcome.any_succeeded() {
            let successes: Vec<u64> = outcome
                .deliveries
                .iter()
                .filter_map(|d| d.result.as_ref().ok().map(|r| r.duration_ms))
                .collect();
            let mean = successes.iter().sum::<u64>() / successes.len() as u64;
            self.record_success(name, mean);
        } else {
            self.record_failure(name);
        }

        Ok(outcome)
    }

    /// Applies pending Open -> HalfOpen transitions on every circuit.
    pub fn refresh_health(&self) {
        for mut entry in self.health.iter_mut() {
            entry.circuit.poll();
        }
    }

    /// Health snapshots for all registered providers, priority order.
    pub fn health_report(&self) -> Vec<ProviderHealthReport> {
        let mut reports: Vec<ProviderHealthReport> =
            self.health.iter().map(|entry| entry.report()).collect();
        reports.sort_by_key(|r| r.priority);
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationType, Priority};
    use crate::providers::circuit::CircuitState;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct AlwaysFails {
        name: &'static str,
        calls: AtomicU64,
    }

    impl AlwaysFails {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl PushProvider for AlwaysFails {
        async fn send(
            &self,
            _recipient_id: i64,
            _message: &PushMessage,
        ) -> Result<ProviderResponse, DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DeliveryError::new(
                DeliveryErrorKind::ProviderUnavailable,
                "down",
            ))
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    struct AlwaysSucceeds {
        name: &'static str,
        calls: AtomicU64,
    }

    impl AlwaysSucceeds {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl PushProvider for AlwaysSucceeds {
        async fn send(
            &self,
            _recipient_id: i64,
            _message: &PushMessage,
        ) -> Result<ProviderResponse, DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderResponse {
                status_code: 200,
                duration_ms: 3,
            })
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn message() -> PushMessage {
        PushMessage {
            notification_type: NotificationType::Mention,
            title: "t".to_string(),
            body: "b".to_string(),
            payload: json!({}),
            priority: Priority::Normal,
        }
    }

    fn manager(threshold: u32) -> ProviderManager {
        ProviderManager::empty(
            threshold,
            Duration::from_secs(300),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn falls_back_to_next_provider_on_failure() {
        let mut m = manager(5);
        m.register(Arc::new(AlwaysFails::new("first")));
        m.register(Arc::new(AlwaysSucceeds::new("second")));

        let delivery = m.send(1, &message(), None).await.unwrap();
        assert_eq!(delivery.provider, "second");
    }

    #[tokio::test]
    async fn all_providers_failing_returns_last_error() {
        let mut m = manager(5);
        m.register(Arc::new(AlwaysFails::new("first")));
        m.register(Arc::new(AlwaysFails::new("second")));

        let err = m.send(1, &message(), None).await.unwrap_err();
        assert_eq!(err.kind, DeliveryErrorKind::ProviderUnavailable);
    }

    #[tokio::test]
    async fn circuit_opens_after_threshold_and_skips_provider() {
        let failing = Arc::new(AlwaysFails::new("flaky"));
        let mut m = manager(2);
        m.register(Arc::clone(&failing) as Arc<dyn PushProvider>);

        // Two failed sends reach the threshold
        assert!(m.send(1, &message(), None).await.is_err());
        assert!(m.send(1, &message(), None).await.is_err());
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);

        let report = &m.health_report()[0];
        assert_eq!(report.circuit_state, CircuitState::Open);

        // Third send is refused without touching the provider
        assert!(m.send(1, &message(), None).await.is_err());
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn open_circuit_falls_through_to_next_provider() {
        let failing = Arc::new(AlwaysFails::new("first"));
        let healthy = Arc::new(AlwaysSucceeds::new("second"));
        let mut m = manager(1);
        m.register(Arc::clone(&failing) as Arc<dyn PushProvider>);
        m.register(Arc::clone(&healthy) as Arc<dyn PushProvider>);

        // First send: "first" fails (opening its circuit), "second" carries it
        let delivery = m.send(1, &message(), None).await.unwrap();
        assert_eq!(delivery.provider, "second");
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);

        // Second send: "first" is skipped entirely
        let delivery = m.send(1, &message(), None).await.unwrap();
        assert_eq!(delivery.provider, "second");
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn preferred_provider_is_tried_first() {
        let mut m = manager(5);
        m.register(Arc::new(AlwaysSucceeds::new("default")));
        m.register(Arc::new(AlwaysSucceeds::new("preferred")));

        let delivery = m.send(1, &message(), Some("preferred")).await.unwrap();
        assert_eq!(delivery.provider, "preferred");
    }

    #[tokio::test]
    async fn unknown_preferred_falls_back_to_priority_order() {
        let mut m = manager(5);
        m.register(Arc::new(AlwaysSucceeds::new("default")));

        let delivery = m.send(1, &message(), Some("missing")).await.unwrap();
        assert_eq!(delivery.provider, "default");
    }

    #[tokio::test]
    async fn multicast_fan_out_aggregates_partial_success() {
        struct EvenFails;

        #[async_trait]
        impl PushProvider for EvenFails {
            async fn send(
                &self,
                recipient_id: i64,
                _message: &PushMessage,
            ) -> Result<ProviderResponse, DeliveryError> {
                if recipient_id % 2 == 0 {
                    Err(DeliveryError::new(
                        DeliveryErrorKind::NetworkTimeout,
                        "slow",
                    ))
                } else {
                    Ok(ProviderResponse {
                        status_code: 200,
                        duration_ms: 2,
                    })
                }
            }

            fn name(&self) -> &'static str {
                "even_fails"
            }
        }

        let mut m = manager(5);
        m.register(Arc::new(EvenFails));

        let outcome = m.send_multicast(&[1, 2, 3], &message(), None).await.unwrap();
        assert!(outcome.any_succeeded());
        assert_eq!(outcome.failed_recipients(), vec![2]);

        // Partial success still counts as a provider success
        let report = &m.health_report()[0];
        assert_eq!(report.success_count, 1);
        assert_eq!(report.failure_count, 0);
    }

    #[tokio::test]
    async fn multicast_total_failure_records_provider_failure() {
        let mut m = manager(5);
        m.register(Arc::new(AlwaysFails::new("down")));

        let outcome = m.send_multicast(&[1, 2], &message(), None).await.unwrap();
        assert!(!outcome.any_succeeded());
        assert_eq!(outcome.failed_recipients(), vec![1, 2]);

        let report = &m.health_report()[0];
        assert_eq!(report.failure_count, 1);
    }

    #[tokio::test]
    async fn multicast_without_providers_is_an_error() {
        let m = manager(5);
        let err = m.send_multicast(&[1], &message(), None).await.unwrap_err();
        assert_eq!(err.kind, DeliveryErrorKind::ProviderUnavailable);
    }

    #[tokio::test]
    async fn health_report_orders_by_priority() {
        let mut m = manager(5);
        m.register(Arc::new(AlwaysSucceeds::new("zero")));
        m.register(Arc::new(AlwaysSucceeds::new("one")));

        let reports = m.health_report();
        assert_eq!(reports[0].provider, "zero");
        assert_eq!(reports[1].provider, "one");
    }
}
