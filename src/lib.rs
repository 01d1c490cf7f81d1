//! Courier-RS Library
//!
//! Notification delivery engine: provider abstraction with health-aware
//! fallback, a hybrid in-memory/durable retry queue, and cross-cutting
//! policy enforcement (rate limiting, content safety, auditing).

use shadow_rs::shadow;
shadow!(build);

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod enhancement;
pub mod error;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod queue;
pub mod repositories;
pub mod schema;
pub mod server;
pub mod state;
pub mod utils;

pub use state::EngineState;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}

pub fn clap_long_version() -> &'static str {
    build::CLAP_LONG_VERSION
}
