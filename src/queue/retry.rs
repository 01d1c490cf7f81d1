//! Retry scheduling per delivery error classification.
//!
//! Each error kind carries its own attempt ceiling, base delay, backoff
//! multiplier, and jitter flag. Rate-limited errors deliberately back off
//! without jitter on long delays; credential errors never retry.

use std::time::Duration;

use rand::Rng;

use crate::models::DeliveryErrorKind;

/// Retry parameters for one error classification
#[derive(Debug, Clone, Copy)]
pub struct RetryRule {
    pub max_attempts: i32,
    pub base_delay_secs: u64,
    pub multiplier: f64,
    pub jitter: bool,
}

/// Computes retry schedules from the per-kind rule table
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Upper bound on any computed delay
    cap: Duration,
}

/// Jitter amplitude as a fraction of the computed delay
const JITTER_FRACTION: f64 = 0.2;

impl RetryPolicy {
    pub fn new(cap_secs: u64) -> Self {
        Self {
            cap: Duration::from_secs(cap_secs),
        }
    }

    /// The rule table. Fixed per error kind.
    pub fn rule(kind: DeliveryErrorKind) -> RetryRule {
        match kind {
            DeliveryErrorKind::NetworkTimeout => RetryRule {
                max_attempts: 5,
                base_delay_secs: 1,
                multiplier: 2.0,
                jitter: true,
            },
            DeliveryErrorKind::ProviderRateLimited => RetryRule {
                max_attempts: 3,
                base_delay_secs: 60,
                multiplier: 4.0,
                jitter: false,
            },
            DeliveryErrorKind::ProviderUnavailable => RetryRule {
                max_attempts: 4,
                base_delay_secs: 10,
                multiplier: 2.5,
                jitter: true,
            },
            DeliveryErrorKind::InvalidCredential => RetryRule {
                max_attempts: 0,
                base_delay_secs: 0,
                multiplier: 0.0,
                jitter: false,
            },
        }
    }

    /// Attempt ceiling for the given error kind.
    pub fn max_attempts(kind: DeliveryErrorKind) -> i32 {
        Self::rule(kind).max_attempts
    }

    /// Exponential delay before jitter: `base * multiplier^attempt`,
    /// bounded by the cap.
    pub fn base_delay(&self, kind: DeliveryErrorKind, attempt_count: i32) -> Duration {
        let rule = Self::rule(kind);
        if rule.max_attempts == 0 {
            return Duration::ZERO;
        }
        let exponent = attempt_count.max(0) as f64;
        let secs = rule.base_delay_secs as f64 * rule.multiplier.powf(exponent);
        let capped = secs.min(self.cap.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Scheduling delay for the next attempt, with jitter applied when the
    /// rule asks for it.
    pub fn delay(&self, kind: DeliveryErrorKind, attempt_count: i32) -> Duration {
        let base = self.base_delay(kind, attempt_count);
        let rule = Self::rule(kind);
        if !rule.jitter || base.is_zero() {
            return base;
        }
        let factor = 1.0 + rand::rng().random_range(-JITTER_FRACTION..=JITTER_FRACTION);
        Duration::from_secs_f64(base.as_secs_f64() * factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rule_table_matches_classification() {
        assert_eq!(RetryPolicy::max_attempts(DeliveryErrorKind::NetworkTimeout), 5);
        assert_eq!(
            RetryPolicy::max_attempts(DeliveryErrorKind::ProviderRateLimited),
            3
        );
        assert_eq!(
            RetryPolicy::max_attempts(DeliveryErrorKind::ProviderUnavailable),
            4
        );
        assert_eq!(
            RetryPolicy::max_attempts(DeliveryErrorKind::InvalidCredential),
            0
        );
    }

    #[test]
    fn credential_errors_never_delay() {
        let policy = RetryPolicy::new(3600);
        assert_eq!(
            policy.delay(DeliveryErrorKind::InvalidCredential, 0),
            Duration::ZERO
        );
    }

    #[test]
    fn rate_limited_delays_have_no_jitter() {
        let policy = RetryPolicy::new(3600);
        // 60 * 4^1 = 240s, deterministic
        assert_eq!(
            policy.delay(DeliveryErrorKind::ProviderRateLimited, 1),
            Duration::from_secs(240)
        );
    }

    #[test]
    fn timeout_base_delays_double() {
        let policy = RetryPolicy::new(3600);
        assert_eq!(
            policy.base_delay(DeliveryErrorKind::NetworkTimeout, 0),
            Duration::from_secs(1)
        );
        assert_eq!(
            policy.base_delay(DeliveryErrorKind::NetworkTimeout, 3),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn delays_are_capped() {
        let policy = RetryPolicy::new(100);
        // 60 * 4^5 is far beyond the cap
        assert_eq!(
            policy.base_delay(DeliveryErrorKind::ProviderRateLimited, 5),
            Duration::from_secs(100)
        );
    }

    proptest! {
        /// Backoff never decreases with the attempt count and never
        /// exceeds the cap.
        #[test]
        fn prop_base_delay_monotone_and_capped(
            attempt in 0i32..20,
            cap_secs in 1u64..100_000,
        ) {
            let policy = RetryPolicy::new(cap_secs);
            for kind in [
                DeliveryErrorKind::NetworkTimeout,
                DeliveryErrorKind::ProviderRateLimited,
                DeliveryErrorKind::ProviderUnavailable,
            ] {
                let current = policy.base_delay(kind, attempt);
                let next = policy.base_delay(kind, attempt + 1);
                prop_assert!(next >= current);
                prop_assert!(current <= Duration::from_secs(cap_secs));
            }
        }

        /// Jittered delays stay within ±20% of the base delay.
        #[test]
        fn prop_jitter_within_bounds(attempt in 0i32..10) {
            let policy = RetryPolicy::new(3600);
            for kind in [
                DeliveryErrorKind::NetworkTimeout,
                DeliveryErrorKind::ProviderUnavailable,
            ] {
                let base = policy.base_delay(kind, attempt).as_secs_f64();
                let jittered = policy.delay(kind, attempt).as_secs_f64();
                prop_assert!(jittered >= base * 0.79);
                prop_assert!(jittered <= base * 1.21);
            }
        }
    }
}
