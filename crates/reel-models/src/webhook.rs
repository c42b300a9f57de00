//! Job status callback payload.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobStatus, RenderResult};

/// Body POSTed to a job's `webhookUrl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookEvent {
    /// Progress update while the job is processing.
    pub fn progress(job_id: JobId, progress: u8) -> Self {
        Self {
            job_id,
            status: JobStatus::Processing,
            progress: Some(progress.min(100)),
            result_url: None,
            error: None,
        }
    }

    /// Terminal event for a finished job.
    pub fn terminal(job_id: JobId, result: &RenderResult) -> Self {
        match result {
            RenderResult::Completed { result_url } => Self {
                job_id,
                status: JobStatus::Completed,
                progress: Some(100),
                result_url: Some(result_url.clone()),
                error: None,
            },
            RenderResult::Failed { error } => Self {
                job_id,
                status: JobStatus::Failed,
                progress: None,
                result_url: None,
                error: Some(error.clone()),
            },
        }
    }
}
