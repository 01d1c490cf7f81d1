//! HTTP request handlers.

pub mod connectivity;
pub mod health;
pub mod notifications;
pub mod queue;
