//! Recipient connectivity state.
//!
//! Connectivity is reported by the surrounding application (realtime
//! gateway, session layer) and consumed by the queue to decide whether a
//! recipient can receive pushes right now. In-memory only; never persisted.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a recipient is currently reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionChannel {
    /// Live browser session through the realtime gateway
    Web,
    /// Registered mobile push subscription
    Mobile,
    /// No known way to reach the user
    None,
}

/// Point-in-time connectivity snapshot for one user
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UserConnectivityStatus {
    pub user_id: i64,
    pub online: bool,
    pub channel: ConnectionChannel,
    pub last_seen_at: NaiveDateTime,
}

impl UserConnectivityStatus {
    pub fn online(user_id: i64, channel: ConnectionChannel) -> Self {
        Self {
            user_id,
            online: true,
            channel,
            last_seen_at: Utc::now().naive_utc(),
        }
    }

    pub fn offline(user_id: i64) -> Self {
        Self {
            user_id,
            online: false,
            channel: ConnectionChannel::None,
            last_seen_at: Utc::now().naive_utc(),
        }
    }
}
