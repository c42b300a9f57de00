//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent directory for per-render scratch directories
    pub work_dir: PathBuf,
    /// Wait after a poll that found no pending job
    pub idle_poll: Duration,
    /// Wait after the queue file could not be read or locked
    pub unavailable_backoff: Duration,
    /// Wait after a failed queue write
    pub conflict_backoff: Duration,
    /// Maximum concurrent FFmpeg encodes in this process
    pub max_concurrent_encodes: usize,
    /// Maximum concurrent asset downloads per render
    pub max_download_parallel: usize,
    /// Per-request timeout for asset downloads
    pub asset_timeout: Duration,
    /// Kill FFmpeg children running longer than this (seconds); `None` disables
    pub ffmpeg_timeout_secs: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("reel"),
            idle_poll: Duration::from_secs(3),
            unavailable_backoff: Duration::from_secs(5),
            conflict_backoff: Duration::from_secs(1),
            max_concurrent_encodes: 2,
            max_download_parallel: 4,
            asset_timeout: Duration::from_secs(120),
            ffmpeg_timeout_secs: Some(1800),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            idle_poll: secs_from_env("WORKER_IDLE_POLL_SECS").unwrap_or(defaults.idle_poll),
            unavailable_backoff: secs_from_env("WORKER_UNAVAILABLE_BACKOFF_SECS")
                .unwrap_or(defaults.unavailable_backoff),
            conflict_backoff: secs_from_env("WORKER_CONFLICT_BACKOFF_SECS").unwrap_or(defaults.conflict_backoff),
            max_concurrent_encodes: std::env::var("WORKER_MAX_ENCODES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_encodes),
            max_download_parallel: std::env::var("WORKER_MAX_DOWNLOAD_PARALLEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_download_parallel),
            asset_timeout: secs_from_env("ASSET_FETCH_TIMEOUT_SECS").unwrap_or(defaults.asset_timeout),
            // 0 disables the limit
            ffmpeg_timeout_secs: match std::env::var("FFMPEG_TIMEOUT_SECS").ok().and_then(|s| s.parse::<u64>().ok()) {
                Some(0) => None,
                Some(secs) => Some(secs),
                None => defaults.ffmpeg_timeout_secs,
            },
        }
    }
}

/// Webhook delivery configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Per-delivery timeout
    pub timeout: Duration,
    /// Bearer token used when a job carries none
    pub default_token: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            default_token: None,
        }
    }
}

impl WebhookConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            timeout: secs_from_env("WEBHOOK_TIMEOUT_SECS").unwrap_or(Duration::from_secs(10)),
            default_token: std::env::var("WORKER_SECRET").ok().filter(|s| !s.is_empty()),
        }
    }
}

fn secs_from_env(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
}
