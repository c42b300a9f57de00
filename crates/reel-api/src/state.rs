//! Application state.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;

use reel_media::ComposeConfig;
use reel_queue::JobStore;
use reel_storage::{BlobStore, StorageConfig};
use reel_worker::{JobHandler, RenderPipeline, Renderer, WebhookConfig, WebhookNotifier, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub queue: JobStore,
    pub storage: Arc<dyn BlobStore>,
    pub handler: JobHandler,
    /// Directory served at `/files` when publishing to local storage
    pub local_files: Option<PathBuf>,
}

impl AppState {
    /// Create new application state from the environment.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let storage_config = StorageConfig::from_env()?;
        let local_files = match &storage_config {
            StorageConfig::Local { root, .. } => Some(root.clone()),
            StorageConfig::R2(_) => None,
        };
        let storage = storage_config.connect().await?;

        let worker_config = WorkerConfig::from_env();
        let encode_permits = Arc::new(Semaphore::new(worker_config.max_concurrent_encodes));
        let pipeline = RenderPipeline::new(
            worker_config,
            ComposeConfig::from_env(),
            Arc::clone(&storage),
            encode_permits,
        )?;
        let webhooks = WebhookNotifier::new(&WebhookConfig::from_env())?;

        let mut state = Self::from_parts(config, JobStore::from_env(), storage, Arc::new(pipeline), webhooks);
        state.local_files = local_files;
        Ok(state)
    }

    /// Assemble state from already-built parts.
    pub fn from_parts(
        config: ApiConfig,
        queue: JobStore,
        storage: Arc<dyn BlobStore>,
        renderer: Arc<dyn Renderer>,
        webhooks: WebhookNotifier,
    ) -> Self {
        let handler = JobHandler::new(queue.clone(), renderer, webhooks);
        Self {
            config,
            queue,
            storage,
            handler,
            local_files: None,
        }
    }
}
