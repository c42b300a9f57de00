//! Synchronous render handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::{info, warn};

use reel_models::{Job, RenderRequest, RenderResponse};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /render
///
/// Render a spec and answer with the outcome once it is published.
///
/// The job is recorded as `processing` before rendering starts, so the queue
/// poller never sees it. Render failures are answered with `200` and
/// `status: failed`; only a malformed or invalid payload is a `400`.
pub async fn render(
    State(state): State<AppState>,
    body: Result<Json<RenderRequest>, JsonRejection>,
) -> ApiResult<Json<RenderResponse>> {
    let Json(request) = body?;
    if request.id.trim().is_empty() {
        return Err(ApiError::Validation("id must not be empty".to_string()));
    }
    request.payload.validate().map_err(ApiError::Validation)?;

    let job = Job::new(request.id, request.payload).with_webhook(request.webhook_url, request.webhook_token);
    let claimed = state.queue.submit_claimed(job).await?;
    info!(job_id = %claimed.id, scenes = claimed.payload.scenes.len(), "Direct render accepted");

    // Detached so a dropped connection cannot leave the job in `processing`
    let handler = state.handler.clone();
    let task = tokio::spawn(async move { handler.handle(claimed, "direct").await });

    match task.await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            warn!(error = %e, "Render task aborted");
            Err(ApiError::internal("render task aborted"))
        }
    }
}
