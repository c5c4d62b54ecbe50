//! Application state shared across handlers.

use crate::config::ServerConfig;
use obsdb_core::LinkContext;
use obsdb_ingest::{BulkIngestPipeline, SyncReconciler};
use obsdb_store::EntityRepository;
use std::sync::Arc;

pub struct AppState {
    pub config: ServerConfig,
    pub repo: Arc<EntityRepository>,
    pub bulk: BulkIngestPipeline,
    pub sync: SyncReconciler,
}

impl AppState {
    pub fn new(config: ServerConfig, repo: Arc<EntityRepository>) -> Self {
        Self {
            bulk: BulkIngestPipeline::new(repo.clone()),
            sync: SyncReconciler::new(repo.clone()),
            config,
            repo,
        }
    }

    /// Link construction context for this response, derived from the
    /// currently configured base URL — never persisted.
    pub fn links(&self) -> LinkContext {
        LinkContext::new(self.config.base_url.clone())
    }
}
