//! Request and response bodies of the render service.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobStatus, RenderResult};
use crate::render_spec::RenderSpec;

/// `POST /render` body: render synchronously and return the outcome.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderRequest {
    pub id: String,
    pub payload: RenderSpec,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub webhook_token: Option<String>,
}

/// `POST /render` response. Render failures are a 200 with `status: failed`.
pub type RenderResponse = RenderResult;

/// `POST /jobs` body: a render spec plus optional callback target.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    #[serde(flatten)]
    pub spec: RenderSpec,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub webhook_token: Option<String>,
}

/// `POST /jobs` response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub success: bool,
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: String,
}

impl SubmitJobResponse {
    pub fn queued(job_id: JobId) -> Self {
        Self {
            success: true,
            job_id,
            status: JobStatus::Pending,
            message: "Render job queued".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_request_parses_snake_case_webhook() {
        let raw = r#"{
            "id": "r1",
            "payload": {"projectId": "p1", "scenes": [{"duration": 3}]},
            "webhook_url": "https://hooks.example.com/job",
            "webhook_token": "t"
        }"#;
        let req: RenderRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.id, "r1");
        assert_eq!(req.webhook_token.as_deref(), Some("t"));
    }

    #[test]
    fn test_submit_request_flattens_spec() {
        let raw = r#"{"projectId": "p1", "scenes": [{}], "webhookUrl": "https://h/x"}"#;
        let req: SubmitJobRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.spec.project_id, "p1");
        assert_eq!(req.webhook_url.as_deref(), Some("https://h/x"));
    }

    #[test]
    fn test_submit_response_shape() {
        let value = serde_json::to_value(SubmitJobResponse::queued(JobId::from("j1"))).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["jobId"], "j1");
        assert_eq!(value["status"], "pending");
    }
}
