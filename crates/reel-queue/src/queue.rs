//! Job list persisted as a JSON array file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use reel_models::{Job, JobStatus, RenderResult, TransitionError};

use crate::error::{QueueError, QueueResult};
use crate::lock;
use crate::records::JobList;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Path of the shared queue file
    pub path: PathBuf,
    /// How long to wait for the cross-process lock
    pub lock_timeout: Duration,
    /// Lock files older than this are considered abandoned
    pub stale_lock_after: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/jobs.json"),
            lock_timeout: Duration::from_secs(10),
            stale_lock_after: Duration::from_secs(30),
        }
    }
}

impl QueueConfig {
    /// Config for a specific file with default timings.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            path: std::env::var("QUEUE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/jobs.json")),
            lock_timeout: Duration::from_secs(
                std::env::var("QUEUE_LOCK_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            stale_lock_after: Duration::from_secs(
                std::env::var("QUEUE_STALE_LOCK_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    fn lock_path(&self) -> PathBuf {
        sibling(&self.path, ".lock")
    }
}

/// Job counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStats {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.failed
    }
}

/// File-backed job store.
///
/// Every mutation is a read-modify-write of the whole list under an
/// in-process mutex and the cross-process lock file, persisted by writing a
/// sibling temp file and renaming it over the queue file. Clones share the
/// same mutex.
#[derive(Debug, Clone)]
pub struct JobStore {
    config: Arc<QueueConfig>,
    local: Arc<Mutex<()>>,
}

impl JobStore {
    /// Create a new job store.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config: Arc::new(config),
            local: Arc::new(Mutex::new(())),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(QueueConfig::from_env())
    }

    /// Path of the queue file.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Claim the first pending `render_video` job in file order.
    ///
    /// The job is `processing` with `startedAt` stamped on disk before it is
    /// returned. A missing or blank file yields `None`.
    pub async fn claim_next_pending(&self) -> QueueResult<Option<Job>> {
        self.mutate(|jobs| {
            let Some(job) = jobs.jobs_mut().find(|j| j.is_claimable()) else {
                return Ok((None, false));
            };
            job.claim(Utc::now())?;
            Ok((Some(job.clone()), true))
        })
        .await
        .map(|claimed| {
            if let Some(job) = &claimed {
                info!(job_id = %job.id, project_id = %job.payload.project_id, "Claimed job");
            }
            claimed
        })
    }

    /// Record the terminal outcome of a claimed job.
    ///
    /// The list is re-read under the lock, so jobs appended since the claim
    /// are preserved.
    pub async fn update(&self, job_id: &str, result: &RenderResult, completed_at: DateTime<Utc>) -> QueueResult<Job> {
        let updated = self
            .mutate(|jobs| {
                let job = jobs
                    .jobs_mut()
                    .find(|j| j.id.as_str() == job_id)
                    .ok_or_else(|| QueueError::not_found(job_id))?;
                job.finish(result, completed_at)?;
                Ok((job.clone(), true))
            })
            .await?;

        info!(job_id = %job_id, status = %updated.status, "Recorded job outcome");
        Ok(updated)
    }

    /// Append a new pending job.
    pub async fn enqueue(&self, job: Job) -> QueueResult<()> {
        if job.status != JobStatus::Pending {
            return Err(TransitionError {
                job_id: job.id.to_string(),
                from: job.status,
                to: JobStatus::Pending,
            }
            .into());
        }

        let job_id = job.id.clone();
        self.mutate(move |jobs| {
            reject_duplicate(jobs, &job)?;
            jobs.push(job);
            Ok(((), true))
        })
        .await?;

        info!(job_id = %job_id, "Enqueued job");
        Ok(())
    }

    /// Append a job already claimed by the caller.
    ///
    /// The job lands as `processing` in the same write that adds it, so no
    /// poller can pick it up.
    pub async fn submit_claimed(&self, mut job: Job) -> QueueResult<Job> {
        job.claim(Utc::now())?;

        let claimed = job.clone();
        self.mutate(move |jobs| {
            reject_duplicate(jobs, &job)?;
            jobs.push(job);
            Ok(((), true))
        })
        .await?;

        info!(job_id = %claimed.id, "Submitted claimed job");
        Ok(claimed)
    }

    /// Look up a render job by id.
    pub async fn get(&self, job_id: &str) -> QueueResult<Option<Job>> {
        let jobs = self.read_jobs().await?;
        Ok(jobs.into_jobs().find(|j| j.id.as_str() == job_id))
    }

    /// Number of records in the file, of any type.
    pub async fn len(&self) -> QueueResult<usize> {
        Ok(self.read_jobs().await?.len())
    }

    /// Render job counts by status.
    pub async fn stats(&self) -> QueueResult<QueueStats> {
        let jobs = self.read_jobs().await?;
        let mut stats = QueueStats::default();
        for job in jobs.jobs() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    /// Run `f` over the current list under both locks; persist if it says so.
    async fn mutate<T, F>(&self, f: F) -> QueueResult<T>
    where
        F: FnOnce(&mut JobList) -> QueueResult<(T, bool)>,
    {
        let _local = self.local.lock().await;
        let _file = lock::acquire(
            &self.config.lock_path(),
            self.config.lock_timeout,
            self.config.stale_lock_after,
        )
        .await?;

        let mut jobs = self.read_jobs().await?;
        let (value, dirty) = f(&mut jobs)?;
        if dirty {
            self.write_jobs(&jobs).await?;
        }
        Ok(value)
    }

    async fn read_jobs(&self) -> QueueResult<JobList> {
        let path = &self.config.path;
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(JobList::default()),
            Err(e) => {
                return Err(QueueError::unavailable(format!("cannot read {}: {}", path.display(), e)));
            }
        };

        if raw.trim().is_empty() {
            return Ok(JobList::default());
        }

        JobList::parse(&raw)
            .map_err(|e| QueueError::unavailable(format!("malformed queue file {}: {}", path.display(), e)))
    }

    async fn write_jobs(&self, jobs: &JobList) -> QueueResult<()> {
        let path = &self.config.path;
        let body = jobs.to_json()?;

        let tmp = sibling(path, &format!(".tmp-{}", Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp, &body).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(QueueError::write_conflict(format!("write {}: {}", tmp.display(), e)));
        }

        if let Err(e) = fs::rename(&tmp, path).await {
            warn!(path = %path.display(), error = %e, "Queue rename failed");
            let _ = fs::remove_file(&tmp).await;
            return Err(QueueError::write_conflict(format!("rename onto {}: {}", path.display(), e)));
        }

        debug!(path = %path.display(), jobs = jobs.len(), "Persisted queue");
        Ok(())
    }
}

fn reject_duplicate(jobs: &JobList, job: &Job) -> QueueResult<()> {
    if jobs.contains_id(job.id.as_str()) {
        warn!(job_id = %job.id, "Duplicate job rejected");
        return Err(QueueError::DuplicateJob(job.id.to_string()));
    }
    Ok(())
}

/// `<path><suffix>` in the same directory, so a rename stays on one filesystem.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_paths() {
        let config = QueueConfig::at("/data/jobs.json");
        assert_eq!(config.lock_path(), PathBuf::from("/data/jobs.json.lock"));
        assert_eq!(
            sibling(Path::new("/data/jobs.json"), ".tmp-x"),
            PathBuf::from("/data/jobs.json.tmp-x")
        );
    }

    #[test]
    fn test_stats_total() {
        let stats = QueueStats {
            pending: 2,
            processing: 1,
            completed: 3,
            failed: 1,
        };
        assert_eq!(stats.total(), 7);
    }
}
