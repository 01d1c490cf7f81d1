//! HTTP server assembly and lifecycle management.
//!
//! Wires the database pool, providers, queue, worker, enhancement layer
//! and orchestrator together, serves the API, and shuts the worker down
//! cleanly on SIGINT/SIGTERM.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::routes::create_router;
use crate::config::Settings;
use crate::db::{establish_async_connection_pool, run_pending_migrations};
use crate::enhancement::EnhancementLayer;
use crate::error::{EngineError, EngineResult};
use crate::orchestrator::{OpenDirectory, Orchestrator};
use crate::providers::ProviderManager;
use crate::queue::{ConnectivityTracker, NotificationQueue, PgDurableStore, QueueWorker};
use crate::repositories::Repositories;
use crate::state::EngineState;

/// HTTP server for the delivery engine.
pub struct Server {
    settings: Settings,
}

impl Server {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Runs the server until a shutdown signal arrives.
    pub async fn run(self) -> anyhow::Result<()> {
        let settings = self.settings;

        info!(
            app_name = %settings.application.name,
            version = %crate::pkg_version(),
            host = %settings.server.host,
            port = settings.server.port,
            "Starting delivery engine"
        );

        if settings.database.auto_migrate {
            let database_url = settings.database.url.clone();
            tokio::task::spawn_blocking(move || run_pending_migrations(&database_url))
                .await
                .map_err(|e| EngineError::Internal {
                    source: anyhow::Error::from(e),
                })??;
            info!("Database migrations applied");
        }

        let db_pool = establish_async_connection_pool(&settings.database).await?;
        info!(
            max_connections = settings.database.max_connections,
            "Database pool initialized"
        );

        let repositories = Repositories::new(db_pool.clone());

        let providers = Arc::new(ProviderManager::from_config(&settings.providers));
        let durable = Arc::new(PgDurableStore::new(
            repositories.queued_notifications.clone(),
        ));
        let queue = Arc::new(NotificationQueue::new(&settings.queue, durable));
        let connectivity = Arc::new(ConnectivityTracker::new());
        let enhancement = Arc::new(EnhancementLayer::new(
            settings.enhancement.clone(),
            Some(repositories.audit_events.clone()),
        ));

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(OpenDirectory),
            providers.clone(),
            queue.clone(),
            connectivity.clone(),
            enhancement.clone(),
        ));

        let cancel = CancellationToken::new();
        let worker = Arc::new(
            QueueWorker::new(
                queue.clone(),
                providers.clone(),
                enhancement.clone(),
                settings.queue.clone(),
                cancel.clone(),
            )
            .await?,
        );
        let worker_handle = worker.start().await?;
        info!("Queue worker started");

        let state = EngineState::new(
            orchestrator,
            queue,
            worker.clone(),
            connectivity,
            providers,
            enhancement,
            db_pool,
        );
        let app = create_router(state);

        let address = settings.server.address();
        let listener = TcpListener::bind(&address).await?;
        info!(address = %address, "Server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Shutdown signal received, stopping queue worker");
        worker.stop().await?;
        worker_handle.await.ok();
        info!("Server stopped");

        Ok(())
    }
}

/// Completes when SIGINT (Ctrl+C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Applies migrations outside the serving path, for the migrate command.
pub async fn run_migrations(settings: &Settings) -> EngineResult<()> {
    let database_url = settings.database.url.clone();
    tokio::task::spawn_blocking(move || run_pending_migrations(&database_url))
        .await
        .map_err(|e| EngineError::Internal {
            source: anyhow::Error::from(e),
        })?
}
