//! Multi-tier sliding-window rate limiting per user and notification type.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::models::NotificationType;

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// A tier was exceeded; `escalated` means this violation tripped the
    /// full-user block
    Limited { tier: &'static str, escalated: bool },
    /// The user is under a full block from earlier violations
    Blocked { remaining: Duration },
}

/// Sliding-window limiter with per-(user, type) tier counters.
///
/// Exceeding any tier rejects the request and counts a violation against
/// the user. Too many violations inside the violation window escalate to a
/// temporary block covering all of the user's notification types.
pub struct RateLimiter {
    config: RateLimitConfig,
    history: DashMap<(i64, NotificationType), VecDeque<Instant>>,
    violations: DashMap<i64, VecDeque<Instant>>,
    blocks: DashMap<i64, Instant>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            history: DashMap::new(),
            violations: DashMap::new(),
            blocks: DashMap::new(),
        }
    }

    pub fn check(&self, user_id: i64, notification_type: NotificationType) -> RateLimitDecision {
        self.check_at(user_id, notification_type, Instant::now())
    }

    /// Number of users currently under a full block.
    pub fn blocked_user_count(&self) -> usize {
        let now = Instant::now();
        self.blocks.iter().filter(|entry| *entry.value() > now).count()
    }

    fn tiers(&self) -> [(&'static str, Duration, u32); 4] {
        [
            (
                "burst",
                Duration::from_secs(self.config.burst_window_secs),
                self.config.burst_limit,
            ),
            ("minute", Duration::from_secs(60), self.config.per_minute),
            ("hour", Duration::from_secs(3600), self.config.per_hour),
            ("day", Duration::from_secs(86_400), self.config.per_day),
        ]
    }

    fn check_at(
        &self,
        user_id: i64,
        notification_type: NotificationType,
        now: Instant,
    ) -> RateLimitDecision {
        if let Some(expiry) = self.blocks.get(&user_id).map(|entry| *entry.value()) {
            if expiry > now {
                return RateLimitDecision::Blocked {
                    remaining: expiry - now,
                };
            }
            self.blocks.remove(&user_id);
        }

        let exceeded_tier = {
            let mut history = self.history.entry((user_id, notification_type)).or_default();
            // The day window is the widest tier; older entries can go.
            while history
                .front()
                .is_some_and(|front| now.duration_since(*front) > Duration::from_secs(86_400))
            {
                history.pop_front();
            }

            let exceeded = self.tiers().into_iter().find(|(_, window, limit)| {
                let count = history
                    .iter()
                    .filter(|t| now.duration_since(**t) <= *window)
                    .count();
                count >= *limit as usize
            });

            if exceeded.is_none() {
                history.push_back(now);
            }
            exceeded
        };

        match exceeded_tier {
            None => RateLimitDecision::Allowed,
            Some((tier, _, _)) => {
                let escalated = self.record_violation(user_id, now);
                RateLimitDecision::Limited { tier, escalated }
            }
        }
    }

    /// Counts a violation; returns true when it escalates to a full block.
    fn record_violation(&self, user_id: i64, now: Instant) -> bool {
        let violation_window = Duration::from_secs(self.config.violation_window_secs);
        let mut violations = self.violations.entry(user_id).or_default();
        while violations
            .front()
            .is_some_and(|front| now.duration_since(*front) > violation_window)
        {
            violations.pop_front();
        }
        violations.push_back(now);

        if violations.len() > self.config.violation_threshold as usize {
            violations.clear();
            drop(violations);
            self.blocks.insert(
                user_id,
                now + Duration::from_secs(self.config.block_duration_secs),
            );
            return true;
        }
        false
    }
}
