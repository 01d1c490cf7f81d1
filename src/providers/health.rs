//! Per-provider health accounting.

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;

use crate::providers::circuit::{CircuitBreaker, CircuitState};

/// Mutable health record for one registered provider.
///
/// Owned by the manager's health map; all mutations happen under the map's
/// per-entry lock, so counters and circuit transitions are linearizable
/// per provider.
#[derive(Debug)]
pub struct ProviderHealth {
    pub provider_name: &'static str,
    /// Selection priority; lower is tried first
    pub priority: usize,
    pub circuit: CircuitBreaker,
    pub success_count: u64,
    pub failure_count: u64,
    total_latency_ms: u64,
    pub last_failure_at: Option<NaiveDateTime>,
}

impl ProviderHealth {
    pub fn new(provider_name: &'static str, priority: usize, circuit: CircuitBreaker) -> Self {
        Self {
            provider_name,
            priority,
            circuit,
            success_count: 0,
            failure_count: 0,
            total_latency_ms: 0,
            last_failure_at: None,
        }
    }

    pub fn record_success(&mut self, latency_ms: u64) {
        self.success_count += 1;
        self.total_latency_ms += latency_ms;
        self.circuit.on_success();
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.last_failure_at = Some(Utc::now().naive_utc());
        self.circuit.on_failure();
    }

    /// Mean latency over successful sends, in milliseconds.
    pub fn average_latency_ms(&self) -> f64 {
        if self.success_count == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.success_count as f64
        }
    }

    pub fn report(&self) -> ProviderHealthReport {
        ProviderHealthReport {
            provider: self.provider_name.to_string(),
            priority: self.priority,
            circuit_state: self.circuit.state(),
            consecutive_failures: self.circuit.consecutive_failures(),
            success_count: self.success_count,
            failure_count: self.failure_count,
            average_latency_ms: self.average_latency_ms(),
            last_failure_at: self.last_failure_at,
        }
    }
}

/// Point-in-time health snapshot exposed by the operational API
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ProviderHealthReport {
    pub provider: String,
    pub priority: usize,
    pub circuit_state: CircuitState,
    pub consecutive_failures: u32,
    pub success_count: u64,
    pub failure_count: u64,
    pub average_latency_ms: f64,
    pub last_failure_at: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn health() -> ProviderHealth {
        ProviderHealth::new(
            "test",
            0,
            CircuitBreaker::new(5, Duration::from_secs(300)),
        )
    }

    #[test]
    fn average_latency_over_successes() {
        let mut h = health();
        h.record_success(10);
        h.record_success(30);
        assert_eq!(h.average_latency_ms(), 20.0);
    }

    #[test]
    fn average_latency_zero_without_successes() {
        let h = health();
        assert_eq!(h.average_latency_ms(), 0.0);
    }

    #[test]
    fn failures_feed_the_circuit() {
        let mut h = health();
        for _ in 0..5 {
            h.record_failure();
        }
        assert_eq!(h.circuit.state(), CircuitState::Open);
        assert_eq!(h.failure_count, 5);
        assert!(h.last_failure_at.is_some());
    }

    #[test]
    fn report_reflects_counters() {
        let mut h = health();
        h.record_success(8);
        h.record_failure();
        let report = h.report();
        assert_eq!(report.success_count, 1);
        assert_eq!(report.failure_count, 1);
        assert_eq!(report.consecutive_failures, 1);
        assert_eq!(report.circuit_state, CircuitState::Closed);
    }
}
