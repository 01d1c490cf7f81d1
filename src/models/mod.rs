//! Domain models for the delivery engine.

mod audit;
mod connectivity;
mod notification;

pub use audit::{AuditEvent, AuditSeverity, NewAuditEvent};
pub use connectivity::{ConnectionChannel, UserConnectivityStatus};
pub use notification::{
    DeliveryErrorKind, DeliveryStatus, NotificationRecord, NotificationRequest, NotificationType,
    Priority, QueuedNotification,
};
