use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use linthub_model::{
    Finding, Job, JobStatusResponse, LogEntry, SubmitJobRequest,
    SubmitJobResponse,
};
use uuid::Uuid;

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

/// `POST /api/analyze`: create a job and queue it for analysis.
///
/// Replies 202 as soon as the job row exists and the pool accepted the
/// work. A saturated pool surfaces as 503 and the job is already marked
/// failed by the time the response leaves.
pub async fn submit_analysis(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> AppResult<(StatusCode, Json<SubmitJobResponse>)> {
    if request.repo_url.trim().is_empty() {
        return Err(AppError::bad_request("repoUrl must not be blank"));
    }

    let job = state.orchestrator.submit(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            id: job.id,
            status: job.status,
        }),
    ))
}

/// `GET /api/status/{id}`.
pub async fn job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<JobStatusResponse>> {
    let job = require_job(&state, id).await?;
    Ok(Json(job.into()))
}

/// `GET /api/results/{id}`: findings in insertion order.
pub async fn job_results(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Finding>>> {
    require_job(&state, id).await?;
    Ok(Json(state.orchestrator.findings_for(id).await?))
}

/// `GET /api/logs/{id}`: the durable log history.
pub async fn job_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<LogEntry>>> {
    require_job(&state, id).await?;
    Ok(Json(state.orchestrator.logs_for(id).await?))
}

async fn require_job(state: &AppState, id: Uuid) -> AppResult<Job> {
    state
        .orchestrator
        .job(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("job {id} not found")))
}
