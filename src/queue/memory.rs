//! Bounded in-memory store for hot queued notifications.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::QueuedNotification;

/// Capacity-bounded map of queued notifications with a per-recipient index.
///
/// Holds the "hot" side of the hybrid queue: work due soon enough that a
/// database round trip per attempt would dominate delivery latency. When
/// full, new work overflows to the durable store instead of evicting.
#[derive(Debug)]
pub struct MemoryStore {
    items: DashMap<Uuid, QueuedNotification>,
    by_recipient: DashMap<i64, HashSet<Uuid>>,
    capacity: usize,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: DashMap::new(),
            by_recipient: DashMap::new(),
            capacity,
        }
    }

    /// Inserts a notification, handing it back when at capacity.
    pub fn insert(&self, notification: QueuedNotification) -> Result<(), QueuedNotification> {
        if self.items.len() >= self.capacity && !self.items.contains_key(&notification.id) {
            return Err(notification);
        }
        self.by_recipient
            .entry(notification.recipient_id)
            .or_default()
            .insert(notification.id);
        self.items.insert(notification.id, notification);
        Ok(())
    }

    /// Removes and returns a notification by id.
    pub fn remove(&self, id: &Uuid) -> Option<QueuedNotification> {
        let (_, notification) = self.items.remove(id)?;
        self.unindex(&notification);
        Some(notification)
    }

    pub fn get(&self, id: &Uuid) -> Option<QueuedNotification> {
        self.items.get(id).map(|entry| entry.clone())
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.items.contains_key(id)
    }

    /// Removes and returns up to `limit` due notifications, most urgent
    /// first (priority, then earliest retry time).
    pub fn take_due(&self, now: NaiveDateTime, limit: usize) -> Vec<QueuedNotification> {
        let mut due: Vec<(crate::models::Priority, NaiveDateTime, Uuid)> = self
            .items
            .iter()
            .filter(|entry| entry.is_due_at(now) && !entry.is_expired_at(now))
            .map(|entry| (entry.priority, entry.next_retry_at, entry.id))
            .collect();
        due.sort();
        due.truncate(limit);

        due.iter().filter_map(|(_, _, id)| self.remove(id)).collect()
    }

    /// Removes and returns all pending work for one recipient.
    pub fn take_for_recipient(&self, recipient_id: i64) -> Vec<QueuedNotification> {
        let ids: Vec<Uuid> = self
            .by_recipient
            .get(&recipient_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        ids.iter().filter_map(|id| self.remove(id)).collect()
    }

    /// Removes and returns every notification past its expiry deadline.
    pub fn sweep_expired(&self, now: NaiveDateTime) -> Vec<QueuedNotification> {
        let expired: Vec<Uuid> = self
            .items
            .iter()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.id)
            .collect();

        expired.iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn unindex(&self, notification: &QueuedNotification) {
        if let Some(mut set) = self.by_recipient.get_mut(&notification.recipient_id) {
            set.remove(&notification.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationRequest, NotificationType, Priority};
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn queued(recipient_id: i64, priority: Priority) -> QueuedNotification {
        QueuedNotification::from_request(
            NotificationRequest::new(
                recipient_id,
                None,
                NotificationType::Message,
                "hello",
                "body",
                json!({}),
                priority,
            ),
            5,
        )
    }

    #[test]
    fn rejects_inserts_beyond_capacity() {
        let store = MemoryStore::new(2);
        assert!(store.insert(queued(1, Priority::Normal)).is_ok());
        assert!(store.insert(queued(2, Priority::Normal)).is_ok());
        let bounced = store.insert(queued(3, Priority::Normal));
        assert!(bounced.is_err());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn reinsert_of_existing_id_is_not_an_overflow() {
        let store = MemoryStore::new(1);
        let n = queued(1, Priority::Normal);
        assert!(store.insert(n.clone()).is_ok());
        assert!(store.insert(n).is_ok());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn take_due_orders_by_priority() {
        let store = MemoryStore::new(10);
        let low = queued(1, Priority::Low);
        let critical = queued(2, Priority::Critical);
        let normal = queued(3, Priority::Normal);
        store.insert(low).unwrap();
        store.insert(critical.clone()).unwrap();
        store.insert(normal).unwrap();

        let now = Utc::now().naive_utc() + Duration::seconds(1);
        let due = store.take_due(now, 2);
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, critical.id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn take_due_skips_future_and_expired_work() {
        let store = MemoryStore::new(10);
        let mut future = queued(1, Priority::Normal);
        future.next_retry_at += Duration::hours(1);
        let mut expired = queued(2, Priority::Normal);
        expired.expires_at = Utc::now().naive_utc() - Duration::seconds(1);
        store.insert(future).unwrap();
        store.insert(expired).unwrap();

        let due = store.take_due(Utc::now().naive_utc(), 10);
        assert!(due.is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn take_for_recipient_drains_only_that_user() {
        let store = MemoryStore::new(10);
        store.insert(queued(1, Priority::Normal)).unwrap();
        store.insert(queued(1, Priority::High)).unwrap();
        store.insert(queued(2, Priority::Normal)).unwrap();

        let drained = store.take_for_recipient(1);
        assert_eq!(drained.len(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.take_for_recipient(1).is_empty());
    }

    #[test]
    fn sweep_expired_removes_past_deadline_work() {
        let store = MemoryStore::new(10);
        let mut expired = queued(1, Priority::Normal);
        expired.expires_at = Utc::now().naive_utc() - Duration::seconds(1);
        store.insert(expired).unwrap();
        store.insert(queued(2, Priority::Normal)).unwrap();

        let swept = store.sweep_expired(Utc::now().naive_utc());
        assert_eq!(swept.len(), 1);
        assert_eq!(store.len(), 1);
    }
}
