//! Configuration validation logic
//!
//! This module provides validation methods for all configuration structures
//! to ensure configuration values are within acceptable ranges and formats.

use crate::config::error::ConfigError;
use crate::config::settings::{
    DatabaseConfig, EnhancementConfig, LoggerSettings, ProvidersConfig, QueueConfig,
    RateLimitConfig, ServerConfig, Settings,
};

/// Valid log levels
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid log formats
const VALID_LOG_FORMATS: &[&str] = &["pretty", "compact", "json"];

impl ServerConfig {
    /// Validate server configuration
    ///
    /// # Validation Rules
    /// - Port must be between 1 and 65535
    /// - Request timeout must be greater than 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "Port must be between 1 and 65535. Please specify a valid port number.",
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::validation(
                "server.request_timeout",
                "Request timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// Validate database configuration
    ///
    /// # Validation Rules
    /// - URL must not be empty and must be a postgres URL
    /// - Max connections must be greater than 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::validation(
                "database.url",
                "Database URL is required. Please specify a valid database connection string.",
            ));
        }

        if !self.url.starts_with("postgres://") && !self.url.starts_with("postgresql://") {
            return Err(ConfigError::validation(
                "database.url",
                "Invalid database URL format. Expected format: postgres://[user:password@]host[:port]/database",
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::validation(
                "database.max_connections",
                "Max connections must be greater than 0.",
            ));
        }

        Ok(())
    }
}

impl LoggerSettings {
    /// Validate logger settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidSetting {
                field: "logger.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidSetting {
                field: "logger.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        Ok(())
    }
}

impl ProvidersConfig {
    /// Validate provider configuration
    ///
    /// # Validation Rules
    /// - Send timeout and circuit parameters must be greater than 0
    /// - At least one provider must be enabled
    /// - Enabled providers must have an endpoint
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.send_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "providers.send_timeout_secs",
                "Send timeout must be greater than 0 seconds.",
            ));
        }

        if self.circuit_failure_threshold == 0 {
            return Err(ConfigError::validation(
                "providers.circuit_failure_threshold",
                "Circuit failure threshold must be greater than 0.",
            ));
        }

        if self.circuit_cooldown_secs == 0 {
            return Err(ConfigError::validation(
                "providers.circuit_cooldown_secs",
                "Circuit cooldown must be greater than 0 seconds.",
            ));
        }

        if !self.web_push.enabled && !self.fcm.enabled && !self.apns.enabled {
            return Err(ConfigError::validation(
                "providers",
                "At least one push provider must be enabled.",
            ));
        }

        if self.web_push.enabled && self.web_push.endpoint.is_empty() {
            return Err(ConfigError::validation(
                "providers.web_push.endpoint",
                "Endpoint is required when the web push provider is enabled.",
            ));
        }

        if self.fcm.enabled && self.fcm.endpoint.is_empty() {
            return Err(ConfigError::validation(
                "providers.fcm.endpoint",
                "Endpoint is required when the FCM provider is enabled.",
            ));
        }

        if self.apns.enabled && self.apns.endpoint.is_empty() {
            return Err(ConfigError::validation(
                "providers.apns.endpoint",
                "Endpoint is required when the APNs provider is enabled.",
            ));
        }

        Ok(())
    }
}

impl QueueConfig {
    /// Validate queue configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_capacity == 0 {
            return Err(ConfigError::validation(
                "queue.memory_capacity",
                "Memory capacity must be greater than 0.",
            ));
        }

        if self.drain_interval_secs == 0 {
            return Err(ConfigError::validation(
                "queue.drain_interval_secs",
                "Drain interval must be greater than 0 seconds.",
            ));
        }

        if self.drain_batch_size == 0 {
            return Err(ConfigError::validation(
                "queue.drain_batch_size",
                "Drain batch size must be greater than 0.",
            ));
        }

        if self.default_max_attempts <= 0 {
            return Err(ConfigError::validation(
                "queue.default_max_attempts",
                "Default max attempts must be greater than 0.",
            ));
        }

        if self.retry_delay_cap_secs == 0 {
            return Err(ConfigError::validation(
                "queue.retry_delay_cap_secs",
                "Retry delay cap must be greater than 0 seconds.",
            ));
        }

        if self.cleanup_cron.trim().is_empty() {
            return Err(ConfigError::validation(
                "queue.cleanup_cron",
                "Cleanup cron expression must not be empty.",
            ));
        }

        Ok(())
    }
}

impl RateLimitConfig {
    /// Validate rate limit tiers
    ///
    /// # Validation Rules
    /// - Every limit and window must be greater than 0
    /// - Tiers must widen: burst <= per_minute <= per_hour <= per_day
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.burst_limit == 0
            || self.per_minute == 0
            || self.per_hour == 0
            || self.per_day == 0
        {
            return Err(ConfigError::validation(
                "enhancement.rate_limit",
                "All rate limit tiers must be greater than 0.",
            ));
        }

        if self.burst_window_secs == 0
            || self.violation_window_secs == 0
            || self.block_duration_secs == 0
        {
            return Err(ConfigError::validation(
                "enhancement.rate_limit",
                "All rate limit windows must be greater than 0 seconds.",
            ));
        }

        if self.per_minute < self.burst_limit
            || self.per_hour < self.per_minute
            || self.per_day < self.per_hour
        {
            return Err(ConfigError::InvalidSetting {
                field: "enhancement.rate_limit".to_string(),
                message: format!(
                    "Tiers must widen: burst ({}) <= per_minute ({}) <= per_hour ({}) <= per_day ({}).",
                    self.burst_limit, self.per_minute, self.per_hour, self.per_day
                ),
            });
        }

        Ok(())
    }
}

impl EnhancementConfig {
    /// Validate enhancement configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limiting_enabled {
            self.rate_limit.validate()?;
        }
        Ok(())
    }
}

impl Settings {
    /// Validate all configuration settings
    ///
    /// This method validates all sub-configurations and returns the first
    /// validation error encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logger.validate()?;
        self.providers.validate()?;
        self.queue.validate()?;
        self.enhancement.validate()?;
        Ok(())
    }
}
