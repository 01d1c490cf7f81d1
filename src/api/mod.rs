//! Operational HTTP API.
//!
//! Exposes notification submission, connectivity updates, queue
//! introspection and health checks over axum, with OpenAPI docs.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;

mod doc;
