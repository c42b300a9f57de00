//! Remote asset download into scratch storage.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::error::{MediaError, MediaResult};

/// Default per-asset download timeout.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 120;

/// What an asset is used for; picks a fallback file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Video,
    Audio,
}

impl AssetKind {
    fn default_extension(&self) -> &'static str {
        match self {
            AssetKind::Image => "png",
            AssetKind::Video => "mp4",
            AssetKind::Audio => "mp3",
        }
    }
}

/// Downloads scene assets over HTTP(S).
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
}

impl AssetFetcher {
    /// Create a fetcher with its own HTTP client.
    pub fn new(timeout: Duration) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediaError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Download `url` into `dir` as `<stem>.<ext>` and return the path.
    pub async fn fetch(&self, url: &str, kind: AssetKind, dir: &Path, stem: &str) -> MediaResult<PathBuf> {
        let parsed = Url::parse(url).map_err(|e| MediaError::asset_fetch(url, e.to_string()))?;

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MediaError::asset_fetch(url, e.to_string()))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let ext = extension_for(&parsed, content_type.as_deref(), kind);
        let path = dir.join(format!("{}.{}", stem, ext));

        let mut file = fs::File::create(&path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MediaError::asset_fetch(url, e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            let _ = fs::remove_file(&path).await;
            return Err(MediaError::asset_fetch(url, "empty response body"));
        }

        debug!(url = %url, bytes = written, path = %path.display(), "Fetched asset");
        Ok(path)
    }
}

/// Pick a file extension from the URL path, then the content type, then the kind.
fn extension_for(url: &Url, content_type: Option<&str>, kind: AssetKind) -> String {
    let from_path = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    if let Some(ext) = from_path {
        return ext;
    }

    let from_mime = content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim())
        .and_then(|mime| match mime {
            "image/png" => Some("png"),
            "image/jpeg" => Some("jpg"),
            "image/webp" => Some("webp"),
            "image/gif" => Some("gif"),
            "video/mp4" => Some("mp4"),
            "video/webm" => Some("webm"),
            "video/quicktime" => Some("mov"),
            "audio/mpeg" => Some("mp3"),
            "audio/wav" | "audio/x-wav" => Some("wav"),
            "audio/ogg" => Some("ogg"),
            "audio/aac" => Some("aac"),
            "audio/mp4" => Some("m4a"),
            _ => None,
        });

    from_mime.unwrap_or(kind.default_extension()).to_string()
}
