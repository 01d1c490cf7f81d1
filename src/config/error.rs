//! Errors raised while assembling the engine's settings.

use thiserror::Error;

/// Failure modes of the configuration layer.
///
/// These all surface at startup, before any engine component runs: a
/// missing settings file, a value that fails validation (server binding,
/// database pool, provider endpoints, queue sizing), or CLI and
/// environment sources that contradict each other.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Named settings file does not exist
    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Merged sources did not deserialize into [`super::Settings`]
    #[error("configuration could not be deserialized: {reason}")]
    Deserialize { reason: String },

    /// A setting is present but out of range or malformed
    #[error("invalid setting `{field}`: {message}")]
    InvalidSetting { field: String, message: String },

    /// Runtime environment selection failed
    #[error("environment selection failed: {reason}")]
    Environment { reason: String },

    /// Two configuration sources that cannot be combined
    #[error("conflicting configuration sources: {reason}")]
    ConflictingSources { reason: String },

    /// Error bubbled up from the config crate's source readers
    #[error("configuration source error: {0}")]
    Source(#[from] config::ConfigError),
}

impl ConfigError {
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        ConfigError::InvalidSetting {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn file_not_found<S: Into<String>>(path: S) -> Self {
        ConfigError::FileNotFound { path: path.into() }
    }

    pub fn conflicting_sources<S: Into<String>>(reason: S) -> Self {
        ConfigError::ConflictingSources {
            reason: reason.into(),
        }
    }
}
