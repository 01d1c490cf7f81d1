//! Per-provider circuit breaker.
//!
//! Tracks consecutive failures and takes a provider out of rotation once
//! the threshold is hit. After the cooldown the circuit admits exactly one
//! trial request: success closes the circuit, failure reopens it for
//! another full cooldown.

use std::time::{Duration, Instant};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests flow normally
    Closed,
    /// Provider is out of rotation until the cooldown elapses
    Open,
    /// One trial request is allowed through
    HalfOpen,
}

/// Circuit breaker over one provider's consecutive failures
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
            failure_threshold,
            cooldown,
        }
    }

    /// Current state, applying the Open -> HalfOpen transition when the
    /// cooldown has elapsed.
    pub fn poll(&mut self) -> CircuitState {
        if self.state == CircuitState::Open
            && let Some(opened_at) = self.opened_at
            && opened_at.elapsed() >= self.cooldown
        {
            self.state = CircuitState::HalfOpen;
            self.trial_in_flight = false;
        }
        self.state
    }

    /// Whether a request may be attempted right now.
    ///
    /// In HalfOpen, only the first caller after the transition is admitted;
    /// concurrent callers are refused until the trial resolves.
    pub fn allows_request(&mut self) -> bool {
        match self.poll() {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if self.trial_in_flight {
                    false
                } else {
                    self.trial_in_flight = true;
                    true
                }
            }
        }
    }

    /// Records a successful send; any success fully closes the circuit.
    pub fn on_success(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.trial_in_flight = false;
    }

    /// Records a failed send.
    ///
    /// A failed HalfOpen trial reopens immediately; in Closed the circuit
    /// opens once consecutive failures reach the threshold.
    pub fn on_failure(&mut self) {
        self.consecutive_failures += 1;
        self.trial_in_flight = false;
        match self.state {
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.opened_at = Some(Instant::now());
            }
            CircuitState::Closed => {
                if self.consecutive_failures >= self.failure_threshold {
                    self.state = CircuitState::Open;
                    self.opened_at = Some(Instant::now());
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// State without side effects, for reporting.
    pub fn state(&self) -> CircuitState {
        self.state
    }
}
