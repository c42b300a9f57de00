//! Render a claimed job, record its outcome, then notify.
//!
//! Shared by the queue poller and the direct HTTP service so both apply the
//! same contract: a claimed job always ends `completed` or `failed` on disk,
//! and the terminal webhook goes out only after that write.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, warn, Instrument};

use reel_models::{Job, JobId, RenderResult, WebhookEvent};
use reel_queue::{JobStore, QueueError};

use crate::logging::JobLogger;
use crate::metrics;
use crate::render::{ProgressFn, Renderer};
use crate::webhook::{JobEvents, WebhookNotifier};

/// Ceiling for the delay between attempts at recording an outcome.
const MAX_RECORD_BACKOFF: Duration = Duration::from_secs(30);

/// Runs claimed jobs to a recorded outcome.
#[derive(Clone)]
pub struct JobHandler {
    store: JobStore,
    renderer: Arc<dyn Renderer>,
    webhooks: WebhookNotifier,
    retry_delay: Duration,
    shutdown: watch::Receiver<bool>,
}

impl JobHandler {
    pub fn new(store: JobStore, renderer: Arc<dyn Renderer>, webhooks: WebhookNotifier) -> Self {
        Self {
            store,
            renderer,
            webhooks,
            retry_delay: Duration::from_secs(1),
            shutdown: watch::channel(false).1,
        }
    }

    /// Stop retrying outcome writes once `shutdown` turns true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Initial delay between attempts at recording an outcome.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Render `job`, which must already be `processing` in the store.
    ///
    /// `source` names the front end in logs and metrics.
    pub async fn handle(&self, job: Job, source: &'static str) -> RenderResult {
        let logger = JobLogger::new(&job.id, &job.payload.project_id, source);
        let span = logger.create_span();
        let events = self.webhooks.target_for(&job).map(|target| self.webhooks.open(target).0);

        async {
            logger.log_start(job.payload.scenes.len());
            let started = Instant::now();

            let progress = progress_relay(events.clone(), job.id.clone(), logger.clone());
            let result = match self.renderer.render(&job.id, &job.payload, progress).await {
                Ok(output) => {
                    logger.log_completion(&output.url, started.elapsed().as_secs_f64());
                    if output.scenes_dropped > 0 {
                        logger.log_warning(&format!("{} scene(s) dropped", output.scenes_dropped));
                    }
                    RenderResult::completed(output.url)
                }
                Err(e) => {
                    let message = e.job_message();
                    logger.log_error(&message);
                    RenderResult::failed(message)
                }
            };
            metrics::record_job_outcome(source, result.is_success());

            self.record(&job.id, &result).await;

            if let Some(events) = &events {
                events.send(WebhookEvent::terminal(job.id.clone(), &result));
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Persist the outcome.
    ///
    /// Transient queue failures are retried with growing delays until the
    /// write lands or shutdown is signalled.
    async fn record(&self, job_id: &JobId, result: &RenderResult) {
        let mut delay = self.retry_delay;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.store.update(job_id.as_str(), result, Utc::now()).await {
                Ok(_) => return,
                Err(QueueError::NotFound(_)) => {
                    error!(job_id = %job_id, "Job vanished from the queue before its outcome was recorded");
                    return;
                }
                Err(e) if e.is_retryable() => {
                    if *self.shutdown.borrow() {
                        error!(job_id = %job_id, attempt, error = %e, "Shutting down with job outcome unrecorded");
                        return;
                    }
                    warn!(job_id = %job_id, attempt, error = %e, "Failed to record outcome, retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_RECORD_BACKOFF);
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Failed to record job outcome");
                    return;
                }
            }
        }
    }
}

/// Progress callback that logs checkpoints and relays them to the job's
/// event stream.
pub fn progress_relay(events: Option<JobEvents>, job_id: JobId, logger: JobLogger) -> ProgressFn {
    Arc::new(move |percent| {
        logger.log_progress(percent, "checkpoint");
        if let Some(events) = &events {
            events.send(WebhookEvent::progress(job_id.clone(), percent));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebhookConfig;
    use crate::error::WorkerError;
    use crate::render::{MockRenderer, RenderOutput};
    use reel_models::{JobStatus, RenderSpec, Scene};
    use reel_queue::QueueConfig;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn job(id: &str) -> Job {
        Job::new(id, RenderSpec::new("proj", vec![Scene::default().with_duration(5.0)]))
    }

    fn handler(dir: &std::path::Path, renderer: MockRenderer) -> JobHandler {
        let store = JobStore::new(QueueConfig::at(dir.join("jobs.json")));
        let webhooks = WebhookNotifier::new(&WebhookConfig::default()).unwrap();
        JobHandler::new(store, Arc::new(renderer), webhooks).with_retry_delay(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_direct_job_recorded_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .times(1)
            .returning(|_, _, _| Err(WorkerError::invalid_spec("scenes must not be empty")));

        let handler = handler(dir.path(), renderer);
        let claimed = handler.store().submit_claimed(job("direct-1")).await.unwrap();
        let result = handler.handle(claimed, "direct").await;

        assert!(!result.is_success());
        let stored = handler.store().get("direct-1").await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(
            stored.error.as_deref(),
            Some("Invalid render spec: scenes must not be empty")
        );
    }

    #[tokio::test]
    async fn test_terminal_webhook_after_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"jobId": "hooked", "status": "completed"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut renderer = MockRenderer::new();
        renderer.expect_render().times(1).returning(|_, _, _| {
            Ok(RenderOutput {
                url: "https://cdn/h.mp4".to_string(),
                key: "renders/h.mp4".to_string(),
                duration: 5.0,
                scenes_rendered: 1,
                scenes_dropped: 0,
            })
        });

        let handler = handler(dir.path(), renderer);
        let claimed = handler
            .store()
            .submit_claimed(job("hooked").with_webhook(Some(server.uri()), None))
            .await
            .unwrap();
        handler.handle(claimed, "direct").await;

        // By the time the terminal event lands the record is durable
        let mut delivered = false;
        for _ in 0..100 {
            if server.received_requests().await.map(|r| !r.is_empty()).unwrap_or(false) {
                delivered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(delivered);
        let stored = handler.store().get("hooked").await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_record_gives_up_on_missing_job() {
        let dir = tempfile::tempdir().unwrap();
        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .times(1)
            .returning(|_, _, _| Err(WorkerError::render_failed("boom")));

        let handler = handler(dir.path(), renderer);
        // Never stored: the outcome cannot be recorded, but handling still returns
        let mut orphan = job("orphan");
        orphan.claim(Utc::now()).unwrap();
        let result = handler.handle(orphan, "poller").await;

        assert_eq!(result.status(), JobStatus::Failed);
        assert!(handler.store().get("orphan").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_terminal_event_is_delivered_last() {
        let server = MockServer::start().await;
        // Progress receipts are slow; the terminal event must still queue behind them
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"status": "processing"})))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(150)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut renderer = MockRenderer::new();
        renderer.expect_render().times(1).returning(|_, _, progress| {
            progress(5);
            progress(70);
            progress(100);
            Ok(RenderOutput {
                url: "https://cdn/o.mp4".to_string(),
                key: "renders/o.mp4".to_string(),
                duration: 5.0,
                scenes_rendered: 1,
                scenes_dropped: 0,
            })
        });

        let handler = handler(dir.path(), renderer);
        let claimed = handler
            .store()
            .submit_claimed(job("ordered").with_webhook(Some(server.uri()), None))
            .await
            .unwrap();
        handler.handle(claimed, "poller").await;

        let mut received = Vec::new();
        for _ in 0..150 {
            received = server.received_requests().await.unwrap_or_default();
            if received.len() >= 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(received.len(), 4);

        let bodies: Vec<serde_json::Value> = received
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect();
        let progress: Vec<u64> = bodies.iter().map(|b| b["progress"].as_u64().unwrap()).collect();
        assert_eq!(progress, vec![5, 70, 100, 100]);
        assert_eq!(bodies[3]["status"], "completed");
        assert_eq!(bodies[3]["resultUrl"], "https://cdn/o.mp4");
    }

    /// Renderer that corrupts the queue file while "rendering".
    fn corrupting_renderer(queue: std::path::PathBuf, restore_after: Option<Duration>) -> MockRenderer {
        let mut renderer = MockRenderer::new();
        renderer.expect_render().times(1).returning(move |_, _, _| {
            let original = std::fs::read(&queue).unwrap();
            std::fs::write(&queue, "{oops").unwrap();
            if let Some(after) = restore_after {
                let queue = queue.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    std::fs::write(&queue, original).unwrap();
                });
            }
            Err(WorkerError::render_failed("boom"))
        });
        renderer
    }

    #[tokio::test]
    async fn test_outcome_lands_after_store_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let queue = dir.path().join("jobs.json");
        let renderer = corrupting_renderer(queue.clone(), Some(Duration::from_millis(100)));

        let handler = handler(dir.path(), renderer);
        let claimed = handler.store().submit_claimed(job("patient")).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handler.handle(claimed, "poller"))
            .await
            .expect("outcome was never recorded");

        assert_eq!(result.status(), JobStatus::Failed);
        let stored = handler.store().get("patient").await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("Render failed: boom"));
    }

    #[tokio::test]
    async fn test_shutdown_stops_outcome_retries() {
        let dir = tempfile::tempdir().unwrap();
        let queue = dir.path().join("jobs.json");
        let renderer = corrupting_renderer(queue.clone(), None);

        let (stop, stopped) = watch::channel(false);
        let handler = handler(dir.path(), renderer).with_shutdown(stopped);
        let claimed = handler.store().submit_claimed(job("stuck")).await.unwrap();
        stop.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handler.handle(claimed, "poller"))
            .await
            .expect("retries did not stop on shutdown");
        assert_eq!(std::fs::read_to_string(&queue).unwrap(), "{oops");
    }
}
