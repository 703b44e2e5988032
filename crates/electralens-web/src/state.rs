use std::sync::Arc;

use electralens_core::{IngestPipeline, Storage};

use crate::config::ServerConfig;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub pipeline: Arc<IngestPipeline>,
    pub config: ServerConfig,
}

impl AppState {
    /// Opens (or creates) the database at `config.db_path`.
    pub async fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let storage = Storage::open(&config.db_path).await?;
        Ok(Self::with_storage(storage, config))
    }

    pub fn with_storage(storage: Storage, config: ServerConfig) -> Self {
        let pipeline = IngestPipeline::new(&config.ingest_config());

        tracing::debug!("Extraction strategies: {:?}", pipeline.strategies());

        Self {
            storage: Arc::new(storage),
            pipeline: Arc::new(pipeline),
            config,
        }
    }
}
