//! Publishing encoded renders under content-addressed keys.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::error::StorageResult;
use crate::store::BlobStore;

/// Key prefix for rendered videos.
pub const RENDERS_PREFIX: &str = "renders";

/// Hex characters of the digest kept in the object name.
const DIGEST_PREFIX_LEN: usize = 16;

/// A published video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVideo {
    pub key: String,
    pub url: String,
    pub size_bytes: u64,
}

/// Hex SHA-256 of a file's contents.
pub async fn content_digest(path: &Path) -> StorageResult<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

/// `renders/render_<projectId>_<digest prefix>.mp4`
pub fn render_key(project_id: &str, digest: &str) -> String {
    let project: String = project_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let short = &digest[..digest.len().min(DIGEST_PREFIX_LEN)];
    format!("{}/render_{}_{}.mp4", RENDERS_PREFIX, project, short)
}

/// Upload an encoded file and delete the scratch copy.
///
/// The scratch file is kept when the upload fails.
pub async fn publish_render(store: &dyn BlobStore, path: &Path, project_id: &str) -> StorageResult<PublishedVideo> {
    let size_bytes = tokio::fs::metadata(path).await?.len();
    let digest = content_digest(path).await?;
    let key = render_key(project_id, &digest);

    store.put_file(path, &key, "video/mp4").await?;
    let url = store.public_url(&key);

    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to delete scratch output");
    }

    info!(
        key = %key,
        url = %url,
        size_bytes,
        backend = store.backend_name(),
        "Render published"
    );

    Ok(PublishedVideo { key, url, size_bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalDirStore;

    #[test]
    fn test_render_key_format() {
        let digest = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
        assert_eq!(
            render_key("proj-42", digest),
            "renders/render_proj-42_0123456789abcdef.mp4"
        );
        assert_eq!(render_key("a/b c", "ff"), "renders/render_a_b_c_ff.mp4");
    }

    #[tokio::test]
    async fn test_digest_is_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();

        let da = content_digest(&a).await.unwrap();
        assert_eq!(da, content_digest(&b).await.unwrap());
        assert_eq!(da.len(), 64);

        std::fs::write(&b, b"other bytes").unwrap();
        assert_ne!(da, content_digest(&b).await.unwrap());
    }

    #[tokio::test]
    async fn test_publish_uploads_and_removes_scratch() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let output = scratch.path().join("final.mp4");
        std::fs::write(&output, b"mp4 data").unwrap();

        let store = LocalDirStore::new(root.path(), "https://cdn.example.com").await.unwrap();
        let published = publish_render(&store, &output, "p1").await.unwrap();

        assert!(published.key.starts_with("renders/render_p1_"));
        assert_eq!(published.url, format!("https://cdn.example.com/{}", published.key));
        assert_eq!(published.size_bytes, 8);
        assert!(!output.exists());
        assert!(root.path().join(&published.key).exists());
    }
}
