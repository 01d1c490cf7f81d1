//! Notification models for queueing and delivery.
//!
//! The queued notification is the persisted/in-memory unit of work; the
//! notification request is the ephemeral intake type built by producers.

use chrono::{Duration, NaiveDateTime, Utc};
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

// ============================================================================
// Enums
// ============================================================================

/// Semantic category of a notification
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Mention,
    Like,
    Follow,
    Comment,
    Message,
    System,
    Moderation,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Mention => "mention",
            NotificationType::Like => "like",
            NotificationType::Follow => "follow",
            NotificationType::Comment => "comment",
            NotificationType::Message => "message",
            NotificationType::System => "system",
            NotificationType::Moderation => "moderation",
        }
    }

    /// Types sent on behalf of another user, subject to block checks.
    pub fn has_actor(&self) -> bool {
        !matches!(
            self,
            NotificationType::System | NotificationType::Moderation
        )
    }
}

impl diesel::query_builder::QueryId for NotificationType {
    type QueryId = NotificationType;
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl ToSql<Text, Pg> for NotificationType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for NotificationType {
    fn from_sql(
        bytes: <Pg as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        match s.as_str() {
            "mention" => Ok(NotificationType::Mention),
            "like" => Ok(NotificationType::Like),
            "follow" => Ok(NotificationType::Follow),
            "comment" => Ok(NotificationType::Comment),
            "message" => Ok(NotificationType::Message),
            "system" => Ok(NotificationType::System),
            "moderation" => Ok(NotificationType::Moderation),
            _ => Err(format!("Unrecognized notification_type: {}", s).into()),
        }
    }
}

/// Delivery priority; determines processing order and default expiry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    // Ord derives ascending by declaration order: Critical sorts first.
    Critical,
    High,
    Normal,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    /// Default expiration window from creation time.
    pub fn expiry_window(&self) -> Duration {
        match self {
            Priority::Critical => Duration::days(1),
            Priority::High => Duration::days(3),
            Priority::Normal => Duration::days(7),
            Priority::Low => Duration::days(3),
        }
    }
}

impl diesel::query_builder::QueryId for Priority {
    type QueryId = Priority;
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl ToSql<Text, Pg> for Priority {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for Priority {
    fn from_sql(
        bytes: <Pg as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        match s.as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            _ => Err(format!("Unrecognized priority: {}", s).into()),
        }
    }
}

/// Lifecycle status of a queued notification
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivering,
    Delivered,
    Failed,
    Expired,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Delivering => "delivering",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Expired => "expired",
        }
    }

    /// Terminal states are never retried and are swept by cleanup.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Delivered | DeliveryStatus::Failed | DeliveryStatus::Expired
        )
    }
}

impl diesel::query_builder::QueryId for DeliveryStatus {
    type QueryId = DeliveryStatus;
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl ToSql<Text, Pg> for DeliveryStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for DeliveryStatus {
    fn from_sql(
        bytes: <Pg as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        match s.as_str() {
            "pending" => Ok(DeliveryStatus::Pending),
            "delivering" => Ok(DeliveryStatus::Delivering),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "failed" => Ok(DeliveryStatus::Failed),
            "expired" => Ok(DeliveryStatus::Expired),
            _ => Err(format!("Unrecognized delivery_status: {}", s).into()),
        }
    }
}

/// Retry classification of the last delivery failure
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryErrorKind {
    NetworkTimeout,
    ProviderRateLimited,
    ProviderUnavailable,
    InvalidCredential,
}

impl DeliveryErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryErrorKind::NetworkTimeout => "network_timeout",
            DeliveryErrorKind::ProviderRateLimited => "provider_rate_limited",
            DeliveryErrorKind::ProviderUnavailable => "provider_unavailable",
            DeliveryErrorKind::InvalidCredential => "invalid_credential",
        }
    }
}

impl diesel::query_builder::QueryId for DeliveryErrorKind {
    type QueryId = DeliveryErrorKind;
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl ToSql<Text, Pg> for DeliveryErrorKind {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for DeliveryErrorKind {
    fn from_sql(
        bytes: <Pg as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        match s.as_str() {
            "network_timeout" => Ok(DeliveryErrorKind::NetworkTimeout),
            "provider_rate_limited" => Ok(DeliveryErrorKind::ProviderRateLimited),
            "provider_unavailable" => Ok(DeliveryErrorKind::ProviderUnavailable),
            "invalid_credential" => Ok(DeliveryErrorKind::InvalidCredential),
            _ => Err(format!("Unrecognized delivery_error_kind: {}", s).into()),
        }
    }
}

// ============================================================================
// NotificationRequest (ephemeral intake type)
// ============================================================================

/// A notification intent as produced by the surrounding application.
///
/// Immutable once created; the orchestrator validates it and either hands
/// it to a provider or wraps it into a [`QueuedNotification`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub recipient_id: i64,
    /// The user who caused the notification, if any (None for system types)
    pub actor_id: Option<i64>,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    pub payload: JsonValue,
    pub priority: Priority,
    pub preferred_provider: Option<String>,
    pub created_at: NaiveDateTime,
}

impl NotificationRequest {
    pub fn new(
        recipient_id: i64,
        actor_id: Option<i64>,
        notification_type: NotificationType,
        title: impl Into<String>,
        body: impl Into<String>,
        payload: JsonValue,
        priority: Priority,
    ) -> Self {
        Self {
            recipient_id,
            actor_id,
            notification_type,
            title: title.into(),
            body: body.into(),
            payload,
            priority,
            preferred_provider: None,
            created_at: Utc::now().naive_utc(),
        }
    }

    pub fn with_preferred_provider(mut self, provider: impl Into<String>) -> Self {
        self.preferred_provider = Some(provider.into());
        self
    }
}

// ============================================================================
// QueuedNotification (unit of work)
// ============================================================================

/// A notification awaiting (re)delivery.
///
/// Status transitions and attempt counting are owned exclusively by the
/// queue; the orchestrator only creates and reads these.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = crate::schema::queued_notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct QueuedNotification {
    pub id: Uuid,
    pub recipient_id: i64,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    pub payload: JsonValue,
    pub priority: Priority,
    pub preferred_provider: Option<String>,
    pub status: DeliveryStatus,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub next_retry_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub last_error: Option<DeliveryErrorKind>,
    pub created_at: NaiveDateTime,
}

impl QueuedNotification {
    /// Wraps a request into a pending unit of work.
    ///
    /// The expiry deadline comes from the priority's default window;
    /// max_attempts starts at the most permissive policy and is narrowed
    /// once the first failure is classified.
    pub fn from_request(request: NotificationRequest, default_max_attempts: i32) -> Self {
        let now = Utc::now().naive_utc();
        let expires_at = request.created_at + request.priority.expiry_window();
        Self {
            id: Uuid::new_v4(),
            recipient_id: request.recipient_id,
            notification_type: request.notification_type,
            title: request.title,
            body: request.body,
            payload: request.payload,
            priority: request.priority,
            preferred_provider: request.preferred_provider,
            status: DeliveryStatus::Pending,
            attempt_count: 0,
            max_attempts: default_max_attempts,
            next_retry_at: now,
            expires_at,
            last_error: None,
            created_at: request.created_at,
        }
    }

    pub fn is_expired_at(&self, now: NaiveDateTime) -> bool {
        now >= self.expires_at
    }

    pub fn is_due_at(&self, now: NaiveDateTime) -> bool {
        self.status == DeliveryStatus::Pending && self.next_retry_at <= now
    }

    /// Rebuilds the delivery message for a retry attempt.
    pub fn to_request(&self) -> NotificationRequest {
        NotificationRequest {
            recipient_id: self.recipient_id,
            actor_id: None,
            notification_type: self.notification_type,
            title: self.title.clone(),
            body: self.body.clone(),
            payload: self.payload.clone(),
            priority: self.priority,
            preferred_provider: self.preferred_provider.clone(),
            created_at: self.created_at,
        }
    }
}

// ============================================================================
// NotificationRecord (collaborator persistence)
// ============================================================================

/// In-app notification-center record handed to the surrounding application.
///
/// Persisted through the collaborator seam regardless of channel delivery
/// outcome, so the recipient always sees the notification in-app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub recipient_id: i64,
    pub actor_id: Option<i64>,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    pub payload: JsonValue,
    pub created_at: NaiveDateTime,
}

impl From<&NotificationRequest> for NotificationRecord {
    fn from(request: &NotificationRequest) -> Self {
        Self {
            recipient_id: request.recipient_id,
            actor_id: request.actor_id,
            notification_type: request.notification_type,
            title: request.title.clone(),
            body: request.body.clone(),
            payload: request.payload.clone(),
            created_at: request.created_at,
        }
    }
}
