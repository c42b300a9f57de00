//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid render spec: {0}")]
    InvalidSpec(String),

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Webhook delivery failed: {0}")]
    WebhookFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] reel_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_spec(msg: impl Into<String>) -> Self {
        Self::InvalidSpec(msg.into())
    }

    pub fn render_failed(msg: impl Into<String>) -> Self {
        Self::RenderFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Message recorded on a failed job.
    ///
    /// Media and storage failures carry their own context, so their message
    /// is recorded without the wrapper prefix.
    pub fn job_message(&self) -> String {
        match self {
            WorkerError::Media(e) => e.to_string(),
            WorkerError::Storage(e) => e.to_string(),
            other => other.to_string(),
        }
    }

    /// Check if the render produced no usable scene.
    pub fn is_no_valid_scenes(&self) -> bool {
        matches!(self, WorkerError::Media(reel_media::MediaError::NoValidScenes))
    }
}
