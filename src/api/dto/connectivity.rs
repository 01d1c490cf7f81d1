//! Connectivity update DTOs.

use serde::Deserialize;
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{ConnectionChannel, UserConnectivityStatus};

fn default_channel() -> ConnectionChannel {
    ConnectionChannel::Web
}

/// Request body for marking a user online.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MarkOnlineRequest {
    /// Channel the user connected through
    #[serde(default = "default_channel")]
    pub channel: ConnectionChannel,
}

/// Connectivity update result.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectivityResponse {
    pub status: UserConnectivityStatus,
    /// Backlog notifications delivered as part of this update
    pub backlog_delivered: usize,
}
