//! Job executor.
//!
//! Polls the queue file for pending render jobs, one at a time:
//!
//! ```text
//! idle -> queue unavailable (back off) | no pending job (wait) | claimed
//!      -> rendering -> result recorded -> terminal webhook
//! ```
//!
//! Caught errors never end the loop; only the shutdown signal does, and an
//! in-flight job always finishes first.

use tokio::sync::watch;
use tracing::{info, warn};

use reel_models::{JobId, JobStatus};
use reel_queue::QueueError;

use crate::config::WorkerConfig;
use crate::handler::JobHandler;
use crate::metrics;

/// What a single poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No pending job was found
    Idle,
    /// The queue file could not be read or locked
    Unavailable,
    /// The queue file could not be written
    Conflict,
    /// A job was claimed and ended in this status
    Handled(JobId, JobStatus),
}

/// Job executor that processes jobs from the queue file.
pub struct JobExecutor {
    config: WorkerConfig,
    handler: JobHandler,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, handler: JobHandler) -> Self {
        let (shutdown, _) = watch::channel(false);
        let handler = handler
            .with_retry_delay(config.conflict_backoff)
            .with_shutdown(shutdown.subscribe());

        Self {
            config,
            handler,
            shutdown,
        }
    }

    /// Run the poll loop until shutdown is signalled.
    pub async fn run(&self) {
        info!(queue = %self.handler.store().path().display(), "Starting job executor");
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let delay = match self.poll_once().await {
                PollOutcome::Handled(..) => continue,
                PollOutcome::Idle => self.config.idle_poll,
                PollOutcome::Unavailable => self.config.unavailable_backoff,
                PollOutcome::Conflict => self.config.conflict_backoff,
            };

            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Job executor stopped");
    }

    /// Signal shutdown. A job already claimed still runs to completion.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Claim and handle at most one job.
    pub async fn poll_once(&self) -> PollOutcome {
        match self.handler.store().claim_next_pending().await {
            Ok(Some(job)) => {
                metrics::record_job_claimed();
                let job_id = job.id.clone();
                let result = self.handler.handle(job, "poller").await;
                PollOutcome::Handled(job_id, result.status())
            }
            Ok(None) => PollOutcome::Idle,
            Err(QueueError::WriteConflict(msg)) => {
                warn!(error = %msg, "Queue write conflict, retrying shortly");
                PollOutcome::Conflict
            }
            Err(e) => {
                warn!(error = %e, "Queue unavailable, backing off");
                PollOutcome::Unavailable
            }
        }
    }
}
