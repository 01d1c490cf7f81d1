//! Shared application state for HTTP handlers.

use std::sync::Arc;

use crate::db::AsyncDbPool;
use crate::enhancement::EnhancementLayer;
use crate::orchestrator::Orchestrator;
use crate::providers::ProviderManager;
use crate::queue::{ConnectivityTracker, NotificationQueue, QueueWorker};

/// Application state shared across all request handlers.
///
/// Every component is behind an `Arc` and the pool is internally
/// reference counted, so cloning per request is cheap.
#[derive(Clone)]
pub struct EngineState {
    pub orchestrator: Arc<Orchestrator>,
    pub queue: Arc<NotificationQueue>,
    pub worker: Arc<QueueWorker>,
    pub connectivity: Arc<ConnectivityTracker>,
    pub providers: Arc<ProviderManager>,
    pub enhancement: Arc<EnhancementLayer>,
    pub db_pool: AsyncDbPool,
}

impl EngineState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        queue: Arc<NotificationQueue>,
        worker: Arc<QueueWorker>,
        connectivity: Arc<ConnectivityTracker>,
        providers: Arc<ProviderManager>,
        enhancement: Arc<EnhancementLayer>,
        db_pool: AsyncDbPool,
    ) -> Self {
        EngineState {
            orchestrator,
            queue,
            worker,
            connectivity,
            providers,
            enhancement,
            db_pool,
        }
    }
}
