//! # obsdb Server
//!
//! The HTTP surface of the observation engine: collection, entity, and
//! navigation endpoints with `$filter/$orderby/$top/$skip/$count/$select/
//! $expand`, the bulk `CreateObservations` endpoint, and the per-thing sync
//! endpoint, plus the background workers (partition maintenance, extent
//! refresh, retention).
//!
//! Self-links are computed from the configured external base URL at
//! response time; changing the base URL changes every link on the next
//! request, with no data migration.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use state::AppState;

use obsdb_store::{
    EntityRepository, EntityTables, ExtentRefreshWorker, ObservationStore,
    PartitionMaintenanceWorker, RetentionWorker,
};
use std::sync::Arc;
use tracing::info;

/// The assembled server: state, router, and background workers.
pub struct ObsServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl ObsServer {
    pub fn new(config: ServerConfig) -> Self {
        let store_config = config.store_config();
        let tables = Arc::new(EntityTables::new());
        let observations = Arc::new(ObservationStore::new(&store_config));
        let repo = Arc::new(EntityRepository::new(
            store_config,
            tables,
            observations,
        ));
        let state = Arc::new(AppState::new(config.clone(), repo));
        Self { config, state }
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Spawn the background workers and serve until the listener fails.
    pub async fn run(self) -> std::io::Result<()> {
        let store_config = self.config.store_config();
        let repo = self.state.repo.clone();

        let (maintenance, maintenance_handle) = PartitionMaintenanceWorker::new(
            repo.observations().clone(),
            store_config.partitions_ahead,
            store_config.maintenance_interval,
        );
        tokio::spawn(maintenance.run());

        let (extents, extents_handle) = ExtentRefreshWorker::new(
            repo.tables().clone(),
            repo.observations().clone(),
            store_config.extent_refresh_interval,
        );
        tokio::spawn(extents.run());

        let (retention, retention_handle) = RetentionWorker::new(
            repo.tables().clone(),
            repo.observations().clone(),
            store_config.retention.clone(),
            store_config.retention_sweep_interval,
        );
        if retention.is_active() {
            tokio::spawn(retention.run());
        }

        let router = routes::router(self.state.clone());
        let listener = tokio::net::TcpListener::bind(self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, base = %self.config.base_url, "obsdb server listening");

        let result = axum::serve(listener, router).await;

        maintenance_handle.stop();
        extents_handle.stop();
        retention_handle.stop();
        result
    }
}
