//! Queued notification repository for async database operations.
//!
//! Provides operations for the queued_notifications table, which backs the
//! durable side of the hybrid retry queue.

use chrono::NaiveDateTime;
use diesel::dsl::sql;
use diesel::expression::SqlLiteral;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::db::AsyncDbPool;
use crate::error::{EngineError, EngineResult};
use crate::models::{DeliveryStatus, Priority, QueuedNotification};

/// Priorities in delivery order, most urgent first. Mirrors the enum's
/// `Ord` so the SQL side and the in-memory side agree.
const PRIORITY_RANK: [Priority; 4] = [
    Priority::Critical,
    Priority::High,
    Priority::Normal,
    Priority::Low,
];

/// CASE expression ranking the text `priority` column.
///
/// The column stores lowercase names, which sort alphabetically; ordering
/// must instead follow [`PRIORITY_RANK`].
fn priority_rank_case() -> String {
    let mut case = String::from("CASE priority");
    for (rank, priority) in PRIORITY_RANK.iter().enumerate() {
        case.push_str(&format!(" WHEN '{}' THEN {}", priority.as_str(), rank));
    }
    case.push_str(" ELSE 99 END");
    case
}

fn priority_rank() -> SqlLiteral<Integer> {
    sql::<Integer>(&priority_rank_case())
}

/// Queued notification repository
#[derive(Clone)]
pub struct QueuedNotificationRepository {
    pool: AsyncDbPool,
}

impl QueuedNotificationRepository {
    /// Creates a new QueuedNotificationRepository with the given connection pool.
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    async fn conn(
        &self,
    ) -> EngineResult<
        diesel_async::pooled_connection::bb8::PooledConnection<
            '_,
            diesel_async::AsyncPgConnection,
        >,
    > {
        self.pool
            .get()
            .await
            .map_err(|e| EngineError::ConnectionPool {
                source: anyhow::Error::from(e),
            })
    }

    /// Persists a notification, replacing any existing row with the same id.
    ///
    /// Upsert semantics let the queue flush the same unit of work more than
    /// once (e.g. after a retry reschedule) without tracking insert state.
    pub async fn upsert(&self, notification: &QueuedNotification) -> EngineResult<()> {
        use crate::schema::queued_notifications::dsl::*;
        let mut conn = self.conn().await?;

        diesel::insert_into(queued_notifications)
            .values(notification)
            .on_conflict(id)
            .do_update()
            .set(notification)
            .execute(&mut conn)
            .await
            .map_err(EngineError::from)?;
        Ok(())
    }

    /// Fetches a notification by id.
    pub async fn find_by_id(
        &self,
        notification_id: Uuid,
    ) -> EngineResult<Option<QueuedNotification>> {
        use crate::schema::queued_notifications::dsl::*;
        let mut conn = self.conn().await?;

        queued_notifications
            .find(notification_id)
            .select(QueuedNotification::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(EngineError::from)
    }

    /// Loads pending notifications whose retry time has arrived.
    ///
    /// Rows are ordered critical-first, then by earliest retry time, so the
    /// drain loop processes the most urgent work under a bounded batch size.
    pub async fn load_due(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> EngineResult<Vec<QueuedNotification>> {
        use crate::schema::queued_notifications::dsl::*;
        let mut conn = self.conn().await?;

        queued_notifications
            .filter(status.eq(DeliveryStatus::Pending))
            .filter(next_retry_at.le(now))
            .filter(expires_at.gt(now))
            .order((priority_rank().asc(), next_retry_at.asc()))
            .limit(limit)
            .select(QueuedNotification::as_select())
            .load(&mut conn)
            .await
            .map_err(EngineError::from)
    }

    /// Loads pending notifications for one recipient, due or not.
    ///
    /// Used when a recipient reconnects: their queued work becomes
    /// immediately deliverable regardless of backoff schedule.
    pub async fn load_pending_for_recipient(
        &self,
        user_id: i64,
    ) -> EngineResult<Vec<QueuedNotification>> {
        use crate::schema::queued_notifications::dsl::*;
        let mut conn = self.conn().await?;

        queued_notifications
            .filter(recipient_id.eq(user_id))
            .filter(status.eq(DeliveryStatus::Pending))
            .order(priority_rank().asc())
            .select(QueuedNotification::as_select())
            .load(&mut conn)
            .await
            .map_err(EngineError::from)
    }

    /// Removes a notification by id. Returns whether a row was deleted.
    pub async fn delete_by_id(&self, notification_id: Uuid) -> EngineResult<bool> {
        use crate::schema::queued_notifications::dsl::*;
        let mut conn = self.conn().await?;

        let deleted = diesel::delete(queued_notifications.find(notification_id))
            .execute(&mut conn)
            .await
            .map_err(EngineError::from)?;
        Ok(deleted > 0)
    }

    /// Marks all expired pending rows, returning how many were updated.
    pub async fn mark_expired(&self, now: NaiveDateTime) -> EngineResult<u64> {
        use crate::schema::queued_notifications::dsl::*;
        let mut conn = self.conn().await?;

        let updated = diesel::update(
            queued_notifications
                .filter(status.eq(DeliveryStatus::Pending))
                .filter(expires_at.le(now)),
        )
        .set(status.eq(DeliveryStatus::Expired))
        .execute(&mut conn)
        .await
        .map_err(EngineError::from)?;
        Ok(updated as u64)
    }

    /// Deletes terminal rows older than the cutoff, returning the count.
    pub async fn purge_terminal_before(&self, cutoff: NaiveDateTime) -> EngineResult<u64> {
        use crate::schema::queued_notifications::dsl::*;
        let mut conn = self.conn().await?;

        let purged = diesel::delete(
            queued_notifications
                .filter(status.eq_any(vec![
                    DeliveryStatus::Delivered,
                    DeliveryStatus::Failed,
                    DeliveryStatus::Expired,
                ]))
                .filter(created_at.lt(cutoff)),
        )
        .execute(&mut conn)
        .await
        .map_err(EngineError::from)?;
        Ok(purged as u64)
    }

    /// Returns unexpired Failed rows to Pending with an immediate retry
    /// time and a fresh attempt counter. Returns the number of rows reset.
    pub async fn reset_failed(&self, now: NaiveDateTime) -> EngineResult<u64> {
        use crate::schema::queued_notifications::dsl::*;
        let mut conn = self.conn().await?;

        let reset = diesel::update(
            queued_notifications
                .filter(status.eq(DeliveryStatus::Failed))
                .filter(expires_at.gt(now)),
        )
        .set((
            status.eq(DeliveryStatus::Pending),
            next_retry_at.eq(now),
            attempt_count.eq(0),
            last_error.eq(None::<String>),
        ))
        .execute(&mut conn)
        .await
        .map_err(EngineError::from)?;
        Ok(reset as u64)
    }

    /// Counts rows currently in the given status.
    pub async fn count_by_status(&self, status_filter: DeliveryStatus) -> EngineResult<i64> {
        use crate::schema::queued_notifications::dsl::*;
        let mut conn = self.conn().await?;

        queued_notifications
            .filter(status.eq(status_filter))
            .count()
            .get_result::<i64>(&mut conn)
            .await
            .map_err(EngineError::from)
    }
}
