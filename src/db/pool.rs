//! Async database connection pool implementation.
//!
//! Uses bb8 connection pool manager with diesel_async for PostgreSQL connections.

use std::time::Duration;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::Pool;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::config::DatabaseConfig;
use crate::error::EngineError;

/// Embedded SQL migrations, applied at startup before the pool is handed out.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Async connection pool type alias.
///
/// bb8::Pool internally uses Arc, so Clone is cheap (just reference count increment).
/// Structures holding AsyncDbPool can derive Clone without additional Arc wrapping.
pub type AsyncDbPool = Pool<AsyncPgConnection>;

/// Creates an async database connection pool from configuration.
///
/// # Arguments
/// * `config` - Database section of the engine configuration
///
/// # Returns
/// Returns `Ok(AsyncDbPool)` on success, or `EngineError` on failure.
pub async fn establish_async_connection_pool(
    config: &DatabaseConfig,
) -> Result<AsyncDbPool, EngineError> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url.clone());
    let pool = Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
        .build(manager)
        .await
        .map_err(|e| EngineError::ConnectionPool {
            source: anyhow::Error::from(e),
        })?;
    Ok(pool)
}

/// Applies pending embedded migrations over a synchronous connection.
///
/// diesel_migrations has no async harness, so migration runs use a short
/// lived blocking connection before the async pool takes over.
pub fn run_pending_migrations(database_url: &str) -> Result<(), EngineError> {
    let mut conn =
        PgConnection::establish(database_url).map_err(|e| EngineError::ConnectionPool {
            source: anyhow::Error::from(e),
        })?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| EngineError::Database {
            operation: "run_pending_migrations".to_string(),
            source: anyhow::anyhow!(e.to_string()),
        })?;
    Ok(())
}
