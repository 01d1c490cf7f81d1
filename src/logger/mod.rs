//! Tracing subscriber initialization.
//!
//! Builds the global subscriber from [`LoggerSettings`]: level via
//! `EnvFilter` (the `RUST_LOG` variable still wins when set), output shape
//! via the fmt layer's pretty/compact/json modes.

use tracing_subscriber::EnvFilter;

use crate::config::error::ConfigError;
use crate::config::settings::LoggerSettings;

/// Installs the global tracing subscriber.
///
/// Must be called once at startup before any spans or events are emitted.
pub fn init(settings: &LoggerSettings) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.clone()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match settings.format.to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        "compact" => builder.compact().try_init(),
        other => {
            return Err(ConfigError::InvalidSetting {
                field: "logger.format".to_string(),
                message: format!("Invalid log format '{}'", other),
            });
        }
    };

    result.map_err(|e| ConfigError::InvalidSetting {
        field: "logger".to_string(),
        message: format!("Subscriber init failed: {e}"),
    })
}
