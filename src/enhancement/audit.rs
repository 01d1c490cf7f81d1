//! Audit trail with a bounded recent-events buffer and optional persistence.

use std::collections::VecDeque;

use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::error::EngineResult;
use crate::models::{AuditSeverity, NewAuditEvent};
use crate::repositories::AuditEventRepository;

/// Records audit events.
///
/// Every event lands in an in-memory ring buffer for health reporting;
/// events are additionally persisted when a repository is attached.
pub struct AuditLogger {
    buffer: Mutex<VecDeque<NewAuditEvent>>,
    capacity: usize,
    repository: Option<AuditEventRepository>,
}

impl AuditLogger {
    pub fn new(capacity: usize, repository: Option<AuditEventRepository>) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            repository,
        }
    }

    /// Records one audit event.
    pub async fn record(
        &self,
        user_id: Option<i64>,
        event_type: &str,
        severity: AuditSeverity,
        details: JsonValue,
    ) -> EngineResult<()> {
        let event = NewAuditEvent::new(user_id, event_type, severity, details);

        if severity >= AuditSeverity::High {
            tracing::warn!(
                event_type = event_type,
                severity = severity.as_str(),
                user_id = ?user_id,
                "Security audit event"
            );
        } else {
            tracing::debug!(
                event_type = event_type,
                severity = severity.as_str(),
                user_id = ?user_id,
                "Audit event"
            );
        }

        {
            let mut buffer = self.buffer.lock().await;
            if buffer.len() >= self.capacity {
                buffer.pop_front();
            }
            buffer.push_back(event.clone());
        }

        if let Some(repository) = &self.repository {
            repository.create(event).await?;
        }
        Ok(())
    }

    /// Most recent events, newest first, up to `limit`.
    pub async fn recent(&self, limit: usize) -> Vec<NewAuditEvent> {
        let buffer = self.buffer.lock().await;
        buffer.iter().rev().take(limit).cloned().collect()
    }

    pub async fn buffered(&self) -> usize {
        self.buffer.lock().await.len()
    }
}
