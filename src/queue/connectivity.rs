//! In-memory recipient connectivity tracking.

use dashmap::DashMap;

use crate::models::{ConnectionChannel, UserConnectivityStatus};

/// Tracks which recipients are currently reachable and how.
///
/// Backed by a DashMap; all operations are idempotent and lock only the
/// touched entry.
#[derive(Debug, Default)]
pub struct ConnectivityTracker {
    statuses: DashMap<i64, UserConnectivityStatus>,
}

impl ConnectivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a user online on the given channel.
    ///
    /// Idempotent: repeated calls refresh last_seen_at and the channel
    /// without any other effect.
    pub fn mark_online(&self, user_id: i64, channel: ConnectionChannel) {
        self.statuses
            .insert(user_id, UserConnectivityStatus::online(user_id, channel));
    }

    /// Marks a user offline.
    pub fn mark_offline(&self, user_id: i64) {
        self.statuses
            .insert(user_id, UserConnectivityStatus::offline(user_id));
    }

    pub fn is_online(&self, user_id: i64) -> bool {
        self.statuses
            .get(&user_id)
            .map(|status| status.online)
            .unwrap_or(false)
    }

    /// Current snapshot for one user; unknown users report offline.
    pub fn status(&self, user_id: i64) -> UserConnectivityStatus {
        self.statuses
            .get(&user_id)
            .map(|status| status.clone())
            .unwrap_or_else(|| UserConnectivityStatus::offline(user_id))
    }

    /// Splits recipients into (online, offline) cohorts.
    pub fn partition_online(&self, user_ids: &[i64]) -> (Vec<i64>, Vec<i64>) {
        user_ids.iter().partition(|&&id| self.is_online(id))
    }

    pub fn online_count(&self) -> usize {
        self.statuses.iter().filter(|entry| entry.online).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_users_are_offline() {
        let tracker = ConnectivityTracker::new();
        assert!(!tracker.is_online(1));
        assert!(!tracker.status(1).online);
    }

    #[test]
    fn mark_online_is_idempotent() {
        let tracker = ConnectivityTracker::new();
        tracker.mark_online(1, ConnectionChannel::Web);
        let first_seen = tracker.status(1).last_seen_at;

        tracker.mark_online(1, ConnectionChannel::Web);
        assert!(tracker.is_online(1));
        assert!(tracker.status(1).last_seen_at >= first_seen);
        assert_eq!(tracker.online_count(), 1);
    }

    #[test]
    fn channel_switch_updates_status() {
        let tracker = ConnectivityTracker::new();
        tracker.mark_online(1, ConnectionChannel::Web);
        tracker.mark_online(1, ConnectionChannel::Mobile);
        assert_eq!(tracker.status(1).channel, ConnectionChannel::Mobile);
    }

    #[test]
    fn mark_offline_clears_channel() {
        let tracker = ConnectivityTracker::new();
        tracker.mark_online(1, ConnectionChannel::Web);
        tracker.mark_offline(1);
        assert!(!tracker.is_online(1));
        assert_eq!(tracker.status(1).channel, ConnectionChannel::None);
    }

    #[test]
    fn partition_splits_cohorts() {
        let tracker = ConnectivityTracker::new();
        tracker.mark_online(1, ConnectionChannel::Web);
        tracker.mark_online(3, ConnectionChannel::Mobile);

        let (online, offline) = tracker.partition_online(&[1, 2, 3, 4]);
        assert_eq!(online, vec![1, 3]);
        assert_eq!(offline, vec![2, 4]);
    }
}
