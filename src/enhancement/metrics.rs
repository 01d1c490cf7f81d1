//! Time-windowed delivery metrics.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use chrono::{Duration, NaiveDateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::NotificationType;

/// One tracked delivery, from attempt start to completion.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub notification_type: NotificationType,
    pub provider: Option<&'static str>,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub success: Option<bool>,
    pub latency_ms: Option<u64>,
}

/// Aggregated view over a time window
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct MetricsReport {
    pub window_secs: u64,
    /// Every delivery started within the window, completed or not
    pub total: u64,
    pub completed: u64,
    pub in_flight: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Fraction of completed deliveries that succeeded
    pub success_rate: f64,
    pub average_latency_ms: f64,
    pub per_provider: BTreeMap<String, u64>,
    pub per_type: BTreeMap<String, u64>,
}

/// Bounded buffer of delivery events with windowed aggregation.
pub struct MetricsCollector {
    events: Mutex<VecDeque<NotificationEvent>>,
    capacity: usize,
}

impl MetricsCollector {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Records the start of a delivery attempt.
    pub async fn delivery_started(&self, id: Uuid, notification_type: NotificationType) {
        let mut events = self.events.lock().await;
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(NotificationEvent {
            id,
            notification_type,
            provider: None,
            started_at: Utc::now().naive_utc(),
            completed_at: None,
            success: None,
            latency_ms: None,
        });
    }

    /// Marks a started delivery as finished.
    ///
    /// Unmatched ids are ignored: the start event may have been evicted
    /// from the bounded buffer.
    pub async fn delivery_completed(
        &self,
        id: Uuid,
        provider: Option<&'static str>,
        success: bool,
        latency_ms: u64,
    ) {
        let mut events = self.events.lock().await;
        if let Some(event) = events.iter_mut().rev().find(|e| e.id == id) {
            event.provider = provider;
            event.completed_at = Some(Utc::now().naive_utc());
            event.success = Some(success);
            event.latency_ms = Some(latency_ms);
        }
    }

    /// Aggregates events whose delivery started inside the window.
    ///
    /// In-flight deliveries count toward totals and per-type breakdowns
    /// even though they have no outcome yet.
    pub async fn metrics(&self, window: Duration) -> MetricsReport {
        let cutoff = Utc::now().naive_utc() - window;
        let events = self.events.lock().await;

        let mut report = MetricsReport {
            window_secs: window.num_seconds().max(0) as u64,
            total: 0,
            completed: 0,
            in_flight: 0,
            succeeded: 0,
            failed: 0,
            success_rate: 0.0,
            average_latency_ms: 0.0,
            per_provider: BTreeMap::new(),
            per_type: BTreeMap::new(),
        };
        let mut latency_total: u64 = 0;

        for event in events.iter().filter(|e| e.started_at >= cutoff) {
            report.total += 1;
            *report
                .per_type
                .entry(event.notification_type.as_str().to_string())
                .or_insert(0) += 1;

            match event.success {
                None => report.in_flight += 1,
                Some(success) => {
                    report.completed += 1;
                    if success {
                        report.succeeded += 1;
                    } else {
                        report.failed += 1;
                    }
                    if let Some(provider) = event.provider {
                        *report.per_provider.entry(provider.to_string()).or_insert(0) += 1;
                    }
                    if let Some(latency) = event.latency_ms {
                        latency_total += latency;
                    }
                }
            }
        }

        if report.completed > 0 {
            report.success_rate = report.succeeded as f64 / report.completed as f64;
            report.average_latency_ms = latency_total as f64 / report.completed as f64;
        }
        report
    }
}
