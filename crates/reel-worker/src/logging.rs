//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for render jobs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};

use reel_models::JobId;

/// Job logger for structured logging with consistent formatting.
///
/// Every event carries the job id, the project id, and the front end that
/// picked the job up (`poller` or `direct`).
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    project_id: String,
    source: &'static str,
}

impl JobLogger {
    /// Create a new job logger.
    pub fn new(job_id: &JobId, project_id: &str, source: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            project_id: project_id.to_string(),
            source,
        }
    }

    /// Log the start of a render.
    pub fn log_start(&self, scenes: usize) {
        info!(
            job_id = %self.job_id,
            project_id = %self.project_id,
            source = self.source,
            scenes,
            "Render started"
        );
    }

    /// Log a progress checkpoint.
    pub fn log_progress(&self, percent: u8, message: &str) {
        info!(
            job_id = %self.job_id,
            source = self.source,
            progress = percent,
            "Render progress: {}", message
        );
    }

    /// Log a recoverable problem.
    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            source = self.source,
            "Render warning: {}", message
        );
    }

    /// Log a job failure.
    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            project_id = %self.project_id,
            source = self.source,
            "Render failed: {}", message
        );
    }

    /// Log a finished render.
    pub fn log_completion(&self, result_url: &str, elapsed_secs: f64) {
        info!(
            job_id = %self.job_id,
            project_id = %self.project_id,
            source = self.source,
            result_url,
            elapsed_secs,
            "Render completed"
        );
    }

    /// Get the job ID.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Get the front end name.
    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            project_id = %self.project_id,
            source = self.source
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "proj-1", "poller");

        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.source(), "poller");
    }

    #[test]
    fn test_job_logger_span() {
        let logger = JobLogger::new(&JobId::from("job-7"), "proj-1", "direct");
        let _span = logger.create_span();
        logger.log_progress(80, "encoding");
    }
}
