//! Audit trail models.

use chrono::{NaiveDateTime, Utc};
use diesel::AsExpression;
use diesel::FromSqlRow;
use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::io::Write;
use uuid::Uuid;

/// Severity of an audit event
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AuditSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Low => "low",
            AuditSeverity::Medium => "medium",
            AuditSeverity::High => "high",
            AuditSeverity::Critical => "critical",
        }
    }
}

impl diesel::query_builder::QueryId for AuditSeverity {
    type QueryId = AuditSeverity;
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl ToSql<Text, Pg> for AuditSeverity {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for AuditSeverity {
    fn from_sql(
        bytes: <Pg as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        match s.as_str() {
            "low" => Ok(AuditSeverity::Low),
            "medium" => Ok(AuditSeverity::Medium),
            "high" => Ok(AuditSeverity::High),
            "critical" => Ok(AuditSeverity::Critical),
            _ => Err(format!("Unrecognized audit severity: {}", s).into()),
        }
    }
}

/// A recorded audit event
#[derive(Debug, Clone, Queryable, Selectable, Serialize, utoipa::ToSchema)]
#[diesel(table_name = crate::schema::audit_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AuditEvent {
    pub id: Uuid,
    pub user_id: Option<i64>,
    pub event_type: String,
    pub severity: AuditSeverity,
    pub details: JsonValue,
    pub created_at: NaiveDateTime,
}

/// Insert model for audit events
#[derive(Debug, Clone, Serialize, Insertable, utoipa::ToSchema)]
#[diesel(table_name = crate::schema::audit_events)]
pub struct NewAuditEvent {
    pub id: Uuid,
    pub user_id: Option<i64>,
    pub event_type: String,
    pub severity: AuditSeverity,
    pub details: JsonValue,
    pub created_at: NaiveDateTime,
}

impl NewAuditEvent {
    pub fn new(
        user_id: Option<i64>,
        event_type: impl Into<String>,
        severity: AuditSeverity,
        details: JsonValue,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            event_type: event_type.into(),
            severity,
            details,
            created_at: Utc::now().naive_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_orders_by_gravity() {
        assert!(AuditSeverity::Low < AuditSeverity::Medium);
        assert!(AuditSeverity::Medium < AuditSeverity::High);
        assert!(AuditSeverity::High < AuditSeverity::Critical);
    }

    #[test]
    fn new_event_carries_fields() {
        let event = NewAuditEvent::new(
            Some(3),
            "rate_limit_violation",
            AuditSeverity::Medium,
            json!({"tier": "burst"}),
        );
        assert_eq!(event.user_id, Some(3));
        assert_eq!(event.event_type, "rate_limit_violation");
        assert_eq!(event.severity, AuditSeverity::Medium);
    }
}
