//! Blob store abstraction and backend selection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::client::{R2Client, R2Config};
use crate::error::{StorageError, StorageResult};
use crate::local::LocalDirStore;

/// Object storage the encoder publishes into.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a local file under `key`.
    async fn put_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()>;

    /// Public URL an uploaded `key` is served from.
    fn public_url(&self, key: &str) -> String;

    /// Verify the backend is reachable.
    async fn check(&self) -> StorageResult<()>;

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}

/// Which backend to publish to.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    R2(R2Config),
    Local { root: PathBuf, public_url: String },
}

impl StorageConfig {
    /// Read `STORAGE_BACKEND` (`r2` default, or `local`) and the backend's variables.
    pub fn from_env() -> StorageResult<Self> {
        let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "r2".to_string());

        match backend.to_ascii_lowercase().as_str() {
            "r2" | "s3" => Ok(Self::R2(R2Config::from_env()?)),
            "local" => Ok(Self::Local {
                root: std::env::var("LOCAL_STORAGE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./data/storage")),
                public_url: std::env::var("LOCAL_PUBLIC_URL")
                    .unwrap_or_else(|_| "http://localhost:8000/files".to_string()),
            }),
            other => Err(StorageError::config_error(format!(
                "Unknown STORAGE_BACKEND '{}', expected 'r2' or 'local'",
                other
            ))),
        }
    }

    /// Build the configured store.
    pub async fn connect(self) -> StorageResult<Arc<dyn BlobStore>> {
        match self {
            Self::R2(config) => Ok(Arc::new(R2Client::new(config).await?)),
            Self::Local { root, public_url } => Ok(Arc::new(LocalDirStore::new(root, public_url).await?)),
        }
    }
}

/// Join a public prefix and a key with exactly one slash.
pub fn join_public_url(prefix: &str, key: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), key.trim_start_matches('/'))
}
