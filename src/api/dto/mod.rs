//! Data Transfer Objects for API requests and responses.
//!
//! DTOs are organized by domain:
//! - `notification` - Submission request DTOs
//! - `connectivity` - Connectivity update DTOs
//! - `error` - Common error response DTO

mod connectivity;
mod error;
mod notification;

pub use connectivity::{ConnectivityResponse, MarkOnlineRequest};
pub use error::ErrorResponse;
pub use notification::{MulticastNotificationRequest, SubmitNotificationRequest};
