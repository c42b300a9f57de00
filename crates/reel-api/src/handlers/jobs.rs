//! Queue submission and job lookup handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use tracing::info;

use reel_models::{Job, JobId, SubmitJobRequest, SubmitJobResponse};
use reel_queue::QueueStats;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// POST /jobs
///
/// Validate a render spec and append it to the queue as a pending job for
/// the poller to pick up.
pub async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<SubmitJobRequest>, JsonRejection>,
) -> ApiResult<Json<SubmitJobResponse>> {
    let Json(request) = body?;
    request.spec.validate().map_err(ApiError::Validation)?;

    let job = Job::new(JobId::new(), request.spec).with_webhook(request.webhook_url, request.webhook_token);
    let job_id = job.id.clone();
    let project_id = job.payload.project_id.clone();
    state.queue.enqueue(job).await?;

    metrics::record_job_enqueued();
    info!(job_id = %job_id, project_id = %project_id, "Job queued");

    Ok(Json(SubmitJobResponse::queued(job_id)))
}

/// GET /jobs/:job_id
///
/// The webhook token is never echoed back.
pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Json<Job>> {
    let mut job = state
        .queue
        .get(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {}", job_id)))?;
    job.webhook_token = None;
    Ok(Json(job))
}

/// GET /jobs/stats
pub async fn queue_stats(State(state): State<AppState>) -> ApiResult<Json<QueueStats>> {
    let stats = state.queue.stats().await?;
    metrics::set_queue_depth(stats.pending as u64);
    Ok(Json(stats))
}
