//! Job records persisted in the shared queue file.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::render_spec::RenderSpec;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job lifecycle status.
///
/// The only legal path is `pending -> processing -> {completed | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be claimed
    #[default]
    Pending,
    /// Claimed by exactly one worker
    Processing,
    /// Rendered and published
    Completed,
    /// Render failed; see `error`
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type of job.
///
/// Only `render_video` jobs are processed. Other types are carried through
/// untouched so foreign records in the shared file survive rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobType {
    RenderVideo,
    Other(String),
}

impl JobType {
    pub fn as_str(&self) -> &str {
        match self {
            JobType::RenderVideo => "render_video",
            JobType::Other(s) => s,
        }
    }
}

impl Default for JobType {
    fn default() -> Self {
        JobType::RenderVideo
    }
}

impl From<String> for JobType {
    fn from(s: String) -> Self {
        if s == "render_video" {
            JobType::RenderVideo
        } else {
            JobType::Other(s)
        }
    }
}

impl From<JobType> for String {
    fn from(t: JobType) -> Self {
        t.as_str().to_string()
    }
}

/// Final outcome of a render, written back into the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenderResult {
    Completed {
        #[serde(rename = "resultUrl")]
        result_url: String,
    },
    Failed {
        error: String,
    },
}

impl RenderResult {
    pub fn completed(result_url: impl Into<String>) -> Self {
        Self::Completed {
            result_url: result_url.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    /// The terminal status this outcome maps to.
    pub fn status(&self) -> JobStatus {
        match self {
            RenderResult::Completed { .. } => JobStatus::Completed,
            RenderResult::Failed { .. } => JobStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RenderResult::Completed { .. })
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Illegal transition for job {job_id}: {from} -> {to}")]
pub struct TransitionError {
    pub job_id: String,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// A render job as stored in the queue file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique, caller-assigned job ID
    pub id: JobId,

    /// Job type
    #[serde(rename = "type", default)]
    #[schemars(with = "String")]
    pub job_type: JobType,

    /// Lifecycle status
    #[serde(default)]
    pub status: JobStatus,

    /// What to render
    pub payload: RenderSpec,

    /// Submission timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Set when a worker claims the job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Set when the job reaches a terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Public URL of the published video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,

    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Callback target for progress/completion notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Bearer token sent with webhook callbacks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_token: Option<String>,
}

impl Job {
    /// Create a new pending render job.
    pub fn new(id: impl Into<JobId>, payload: RenderSpec) -> Self {
        Self {
            id: id.into(),
            job_type: JobType::RenderVideo,
            status: JobStatus::Pending,
            payload,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result_url: None,
            error: None,
            webhook_url: None,
            webhook_token: None,
        }
    }

    /// Attach a webhook callback target.
    pub fn with_webhook(mut self, url: Option<String>, token: Option<String>) -> Self {
        self.webhook_url = url;
        self.webhook_token = token;
        self
    }

    /// Whether the claim scan should pick this job.
    pub fn is_claimable(&self) -> bool {
        self.status == JobStatus::Pending && self.job_type == JobType::RenderVideo
    }

    /// Move `pending -> processing` and stamp `startedAt`.
    pub fn claim(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Processing)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Move `processing -> completed|failed` and record the outcome.
    pub fn finish(&mut self, result: &RenderResult, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(result.status())?;
        self.completed_at = Some(now);
        match result {
            RenderResult::Completed { result_url } => {
                self.result_url = Some(result_url.clone());
                self.error = None;
            }
            RenderResult::Failed { error } => {
                self.error = Some(error.clone());
            }
        }
        Ok(())
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                job_id: self.id.to_string(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
