//! Command-line interface.
//!
//! Parses arguments, merges CLI overrides into the loaded configuration,
//! and dispatches to the serve and migrate commands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::{ConfigLoader, Settings};
use crate::error::{EngineError, EngineResult};

/// Notification delivery engine.
#[derive(Parser, Debug)]
#[command(
    name = "courier",
    version = crate::clap_long_version(),
    about = "Notification delivery engine with provider fallback and a durable retry queue"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to a configuration file (overrides the config directory search)
    #[arg(short, long, global = true, value_parser = validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default command)
    Serve {
        /// Bind address, overrides the configured host
        #[arg(long, value_parser = validation::validate_host_address)]
        host: Option<String>,

        /// Bind port, overrides the configured port
        #[arg(short, long, value_parser = validation::validate_port)]
        port: Option<u16>,

        /// Validate configuration and exit without serving
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply pending database migrations
    Migrate {
        /// Report what would run without touching the database
        #[arg(long)]
        dry_run: bool,
    },
}

// ============================================================================
// Argument validation
// ============================================================================

mod validation {
    use std::path::PathBuf;

    pub fn validate_port(value: &str) -> Result<u16, String> {
        let port: u16 = value
            .parse()
            .map_err(|_| format!("'{value}' is not a valid port number"))?;
        if port == 0 {
            return Err("Port must be between 1 and 65535".to_string());
        }
        Ok(port)
    }

    pub fn validate_config_file_path(value: &str) -> Result<PathBuf, String> {
        let path = PathBuf::from(value);
        if !path.exists() {
            return Err(format!("Configuration file does not exist: {value}"));
        }
        if !path.is_file() {
            return Err(format!("Configuration path is not a file: {value}"));
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(path),
            _ => Err(format!("Configuration file must be a .toml file: {value}")),
        }
    }

    pub fn validate_host_address(value: &str) -> Result<String, String> {
        if value.is_empty() {
            return Err("Host address must not be empty".to_string());
        }
        if value.contains(' ') {
            return Err(format!("'{value}' is not a valid host address"));
        }
        Ok(value.to_string())
    }
}

// ============================================================================
// Configuration merging
// ============================================================================

/// Merges CLI arguments into the file-based configuration.
pub struct ConfigurationMerger;

impl ConfigurationMerger {
    /// Loads settings, honoring an explicit `--config` path.
    pub fn load(config_path: Option<&PathBuf>) -> EngineResult<Settings> {
        if let Some(path) = config_path {
            // The loader reads the file path from the environment. Safe
            // here: called once at startup before any threads spawn.
            unsafe {
                std::env::set_var("COURIER_CONFIG_FILE", path);
            }
        }

        let settings = ConfigLoader::new()
            .map_err(|e| EngineError::Configuration {
                key: "config".to_string(),
                source: anyhow::Error::from(e),
            })?
            .load()
            .map_err(|e| EngineError::Configuration {
                key: "config".to_string(),
                source: anyhow::Error::from(e),
            })?;
        Ok(settings)
    }

    /// Applies CLI overrides on top of loaded settings, then re-validates.
    pub fn merge_cli_args(cli: &Cli, mut settings: Settings) -> EngineResult<Settings> {
        if cli.verbose {
            settings.logger.level = "debug".to_string();
        } else if cli.quiet {
            settings.logger.level = "warn".to_string();
        }

        if let Some(Commands::Serve { host, port, .. }) = &cli.command {
            if let Some(host) = host {
                settings.server.host = host.clone();
            }
            if let Some(port) = port {
                settings.server.port = *port;
            }
        }

        settings.validate().map_err(|e| EngineError::Configuration {
            key: "cli".to_string(),
            source: anyhow::Error::from(e),
        })?;
        Ok(settings)
    }
}

// ============================================================================
// Command dispatch
// ============================================================================

/// Executes the parsed command.
pub struct CommandHandler;

impl CommandHandler {
    pub async fn handle_serve(settings: Settings, dry_run: bool) -> anyhow::Result<()> {
        if dry_run {
            info!(
                host = %settings.server.host,
                port = settings.server.port,
                database_max_connections = settings.database.max_connections,
                queue_memory_capacity = settings.queue.memory_capacity,
                "Configuration valid, dry run requested, not serving"
            );
            return Ok(());
        }

        crate::server::Server::new(settings).run().await
    }

    pub async fn handle_migrate(settings: Settings, dry_run: bool) -> anyhow::Result<()> {
        if dry_run {
            info!(
                database_url_configured = !settings.database.url.is_empty(),
                "Dry run requested, migrations not applied"
            );
            return Ok(());
        }

        crate::server::run_migrations(&settings).await?;
        info!("Migrations applied");
        Ok(())
    }
}
