//! Webhook relay for job progress and outcomes.
//!
//! Each job gets one delivery task fed by a channel, so its events reach the
//! receiver in the order they were sent and a slow receiver never holds up
//! a render. Failures are logged and counted, never retried.

use reqwest::header::AUTHORIZATION;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use reel_models::{Job, WebhookEvent};

use crate::config::WebhookConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Where and how to deliver a job's events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub url: String,
    pub token: Option<String>,
}

/// Sends webhook events.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    default_token: Option<String>,
}

impl WebhookNotifier {
    /// Create a notifier with its own HTTP client.
    pub fn new(config: &WebhookConfig) -> WorkerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WorkerError::config_error(format!("Failed to build webhook client: {}", e)))?;

        Ok(Self {
            client,
            default_token: config.default_token.clone(),
        })
    }

    /// Resolve the delivery target for explicit webhook fields.
    ///
    /// The per-job token wins over the process default.
    pub fn target(&self, url: Option<&str>, token: Option<&str>) -> Option<WebhookTarget> {
        let url = url.map(str::trim).filter(|u| !u.is_empty())?;
        let token = token
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| self.default_token.clone());

        Some(WebhookTarget {
            url: url.to_string(),
            token,
        })
    }

    /// Resolve the delivery target for a job.
    pub fn target_for(&self, job: &Job) -> Option<WebhookTarget> {
        self.target(job.webhook_url.as_deref(), job.webhook_token.as_deref())
    }

    /// Deliver one event and wait for the response.
    pub async fn deliver(&self, target: &WebhookTarget, event: &WebhookEvent) -> WorkerResult<()> {
        let mut request = self.client.post(&target.url).json(event);
        if let Some(token) = &target.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| WorkerError::WebhookFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::WebhookFailed(format!("receiver returned {}", status)));
        }

        debug!(job_id = %event.job_id, status = %event.status, "Webhook delivered");
        Ok(())
    }

    /// Open the ordered event stream for one job.
    ///
    /// The returned task delivers events one at a time and exits once every
    /// [`JobEvents`] handle has been dropped and the backlog is flushed.
    pub fn open(&self, target: WebhookTarget) -> (JobEvents, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<WebhookEvent>();
        let notifier = self.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = notifier.deliver(&target, &event).await {
                    metrics::record_webhook_failure();
                    warn!(
                        job_id = %event.job_id,
                        status = %event.status,
                        url = %target.url,
                        error = %e,
                        "Webhook delivery failed"
                    );
                }
            }
        });

        (JobEvents { tx }, task)
    }
}

/// Sending side of a job's event stream.
#[derive(Debug, Clone)]
pub struct JobEvents {
    tx: mpsc::UnboundedSender<WebhookEvent>,
}

impl JobEvents {
    /// Queue an event behind those already sent.
    pub fn send(&self, event: WebhookEvent) {
        if self.tx.send(event).is_err() {
            debug!("Webhook stream closed, event dropped");
        }
    }
}
