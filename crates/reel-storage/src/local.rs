//! Local directory store for development and tests.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use crate::error::{StorageError, StorageResult};
use crate::store::{join_public_url, BlobStore};

/// Stores objects as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
    public_url: String,
}

impl LocalDirStore {
    /// Create the store, making the root directory if needed.
    pub async fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            public_url: public_url.into(),
        })
    }

    /// Filesystem path for `key`.
    pub fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::invalid_key(key));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalDirStore {
    async fn put_file(&self, path: &Path, key: &str, _content_type: &str) -> StorageResult<()> {
        let dest = self.path_for(key)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::copy(path, &dest)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", dest.display(), e)))?;

        info!("Stored {} at {}", path.display(), dest.display());
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.public_url, key)
    }

    async fn check(&self) -> StorageResult<()> {
        let meta = fs::metadata(&self.root).await?;
        if !meta.is_dir() || meta.permissions().readonly() {
            return Err(StorageError::config_error(format!(
                "{} is not a writable directory",
                self.root.display()
            )));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_file_and_url() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let src = scratch.path().join("out.mp4");
        std::fs::write(&src, b"video").unwrap();

        let store = LocalDirStore::new(root.path(), "http://localhost:8000/files/")
            .await
            .unwrap();
        store.put_file(&src, "renders/a.mp4", "video/mp4").await.unwrap();

        assert_eq!(std::fs::read(root.path().join("renders/a.mp4")).unwrap(), b"video");
        assert_eq!(
            store.public_url("renders/a.mp4"),
            "http://localhost:8000/files/renders/a.mp4"
        );
        assert!(store.check().await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalDirStore::new(root.path(), "http://x").await.unwrap();

        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("/abs").is_err());
        assert!(store.path_for("").is_err());
        assert!(store.path_for("renders/ok.mp4").is_ok());
    }
}
