//! Cross-process advisory lock file.
//!
//! The lock is a sibling file created with exclusive-create semantics. Only
//! the process that created it may touch the queue file until the guard is
//! dropped. A lock file older than the stale age is assumed to belong to a
//! crashed process and is removed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{QueueError, QueueResult};

const RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Held lock; the lock file is removed on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove queue lock");
            }
        }
    }
}

/// Acquire the lock at `path`, waiting up to `timeout`.
pub async fn acquire(path: &Path, timeout: Duration, stale_after: Duration) -> QueueResult<LockGuard> {
    let deadline = Instant::now() + timeout;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| QueueError::unavailable(format!("cannot create {}: {}", parent.display(), e)))?;
    }

    loop {
        match OpenOptions::new().write(true).create_new(true).open(path).await {
            Ok(mut file) => {
                let stamp = format!("{} {}\n", std::process::id(), chrono::Utc::now().to_rfc3339());
                let _ = file.write_all(stamp.as_bytes()).await;
                return Ok(LockGuard {
                    path: path.to_path_buf(),
                });
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if is_stale(path, stale_after).await {
                    warn!(path = %path.display(), "Breaking stale queue lock");
                    match fs::remove_file(path).await {
                        Ok(()) => continue,
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => debug!(error = %e, "Could not remove stale lock"),
                    }
                }
            }
            Err(e) => {
                return Err(QueueError::unavailable(format!(
                    "cannot create lock {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        if Instant::now() >= deadline {
            return Err(QueueError::unavailable(format!(
                "lock {} not acquired within {:?}",
                path.display(),
                timeout
            )));
        }
        tokio::time::sleep(RETRY_INTERVAL).await;
    }
}

async fn is_stale(path: &Path, stale_after: Duration) -> bool {
    let modified = match fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(_) => return false,
    };
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age > stale_after)
        .unwrap_or(false)
}
