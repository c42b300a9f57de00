//! Render and job metrics.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_CLAIMED_TOTAL: &str = "reel_jobs_claimed_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "reel_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "reel_jobs_failed_total";
    pub const SCENES_DROPPED_TOTAL: &str = "reel_scenes_dropped_total";
    pub const WEBHOOK_FAILURES_TOTAL: &str = "reel_webhook_failures_total";
    pub const RENDER_DURATION_SECONDS: &str = "reel_render_duration_seconds";
    pub const ENCODE_DURATION_SECONDS: &str = "reel_encode_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "reel_upload_duration_seconds";
}

/// Serve Prometheus metrics for the worker process on `addr`.
pub fn install_exporter(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| e.to_string())
}

/// Record a claimed job.
pub fn record_job_claimed() {
    counter!(names::JOBS_CLAIMED_TOTAL).increment(1);
}

/// Record a job outcome for the given front end.
pub fn record_job_outcome(source: &'static str, success: bool) {
    let labels = [("source", source)];
    if success {
        counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
    } else {
        counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
    }
}

/// Record a scene dropped from a render.
pub fn record_scene_dropped() {
    counter!(names::SCENES_DROPPED_TOTAL).increment(1);
}

/// Record a failed webhook delivery.
pub fn record_webhook_failure() {
    counter!(names::WEBHOOK_FAILURES_TOTAL).increment(1);
}

/// Record total render duration.
pub fn record_render_duration(duration_secs: f64) {
    histogram!(names::RENDER_DURATION_SECONDS).record(duration_secs);
}

/// Record final encode duration.
pub fn record_encode_duration(duration_secs: f64) {
    histogram!(names::ENCODE_DURATION_SECONDS).record(duration_secs);
}

/// Record upload duration.
pub fn record_upload_duration(duration_secs: f64) {
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}
