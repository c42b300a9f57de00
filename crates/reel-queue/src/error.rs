//! Queue error types.

use thiserror::Error;

use reel_models::TransitionError;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// File unreadable, malformed, or lock not acquired in time.
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    /// Persisting the job list failed; nothing was written.
    #[error("Queue write failed: {0}")]
    WriteConflict(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("Duplicate job: {0}")]
    DuplicateJob(String),
}

impl QueueError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn write_conflict(msg: impl Into<String>) -> Self {
        Self::WriteConflict(msg.into())
    }

    pub fn not_found(job_id: impl Into<String>) -> Self {
        Self::NotFound(job_id.into())
    }

    /// Whether the caller should wait and try the same operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::WriteConflict(_))
    }
}
