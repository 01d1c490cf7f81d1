//! Audit event repository for async database operations.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::AsyncDbPool;
use crate::error::{EngineError, EngineResult};
use crate::models::{AuditEvent, NewAuditEvent};

/// Audit event repository
#[derive(Clone)]
pub struct AuditEventRepository {
    pool: AsyncDbPool,
}

impl AuditEventRepository {
    /// Creates a new AuditEventRepository with the given connection pool.
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    /// Persists an audit event
    ///
    /// # Arguments
    /// * `new_event` - The event to insert
    ///
    /// # Returns
    /// The persisted event
    pub async fn create(&self, new_event: NewAuditEvent) -> EngineResult<AuditEvent> {
        use crate::schema::audit_events::dsl::*;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| EngineError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        diesel::insert_into(audit_events)
            .values(&new_event)
            .returning(AuditEvent::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(EngineError::from)
    }

    /// Persists a batch of audit events in one statement.
    pub async fn create_batch(&self, new_events: &[NewAuditEvent]) -> EngineResult<usize> {
        use crate::schema::audit_events::dsl::*;
        if new_events.is_empty() {
            return Ok(0);
        }
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| EngineError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        diesel::insert_into(audit_events)
            .values(new_events)
            .execute(&mut conn)
            .await
            .map_err(EngineError::from)
    }

    /// Finds recent events for a user with pagination
    ///
    /// # Arguments
    /// * `uid` - The user ID
    /// * `offset` - Number of records to skip
    /// * `limit` - Maximum number of records to return
    ///
    /// # Returns
    /// Tuple of (events vector, total count)
    pub async fn find_by_user_id(
        &self,
        uid: i64,
        offset: i64,
        limit: i64,
    ) -> EngineResult<(Vec<AuditEvent>, i64)> {
        use crate::schema::audit_events::dsl::*;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| EngineError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        let events = audit_events
            .filter(user_id.eq(uid))
            .order(created_at.desc())
            .offset(offset)
            .limit(limit)
            .select(AuditEvent::as_select())
            .load(&mut conn)
            .await
            .map_err(EngineError::from)?;

        let total = audit_events
            .filter(user_id.eq(uid))
            .count()
            .get_result::<i64>(&mut conn)
            .await
            .map_err(EngineError::from)?;

        Ok((events, total))
    }
}
