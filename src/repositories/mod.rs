//! Repository layer for data access operations.
//!
//! Provides async CRUD operations for persisted engine entities.

mod audit_event_repo;
mod queued_notification_repo;

pub use audit_event_repo::AuditEventRepository;
pub use queued_notification_repo::QueuedNotificationRepository;

use crate::db::AsyncDbPool;

/// Aggregates all repositories for convenient access.
///
/// Since `AsyncDbPool` uses `Arc` internally, cloning is cheap.
#[derive(Clone)]
pub struct Repositories {
    pub queued_notifications: QueuedNotificationRepository,
    pub audit_events: AuditEventRepository,
}

impl Repositories {
    /// Creates a new Repositories instance with all repositories initialized.
    ///
    /// # Arguments
    /// * `pool` - The async database connection pool
    pub fn new(pool: AsyncDbPool) -> Self {
        Self {
            queued_notifications: QueuedNotificationRepository::new(pool.clone()),
            audit_events: AuditEventRepository::new(pool),
        }
    }
}
