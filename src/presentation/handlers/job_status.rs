use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::{Job, JobResult, JobStatus, ProgressStage};
use crate::presentation::state::AppState;

use super::error::ApiError;
use super::jobs::{JobIdQuery, parse_job_id};

#[derive(Serialize)]
pub struct JobStatusResponse {
    pub id: String,
    pub status: JobStatus,
    pub job_type: String,
    pub progress: u8,
    pub message: String,
    pub created_at: String,
    pub updated_at: String,
    pub error: Option<String>,
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<ProgressStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_seconds_remaining: Option<u64>,
}

/// Read-only status for polling clients, enriched with the advisory ETA when
/// this process is running the job.
#[tracing::instrument(skip(state))]
pub async fn job_status_handler(
    State(state): State<AppState>,
    Query(query): Query<JobIdQuery>,
) -> Result<Response, ApiError> {
    let id = parse_job_id(&query.id)?;
    let job = state.controller.get_job(id).await?;
    let snapshot = state.progress_board.snapshot(id);

    let stage = snapshot.as_ref().map(|s| s.stage);
    let message = status_message(&job, stage);
    let response = JobStatusResponse {
        id: job.id.to_string(),
        status: job.status,
        job_type: job.job_type.to_string(),
        progress: job.progress,
        message,
        created_at: job.created_at.to_rfc3339(),
        updated_at: job.updated_at.to_rfc3339(),
        error: job.error,
        result: job.result,
        stage,
        estimated_seconds_remaining: snapshot.and_then(|s| s.estimated_seconds_remaining),
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}

fn status_message(job: &Job, stage: Option<ProgressStage>) -> String {
    match job.status {
        JobStatus::Pending => "Queued".to_string(),
        JobStatus::Processing => stage
            .map(|s| s.message())
            .unwrap_or("Processing")
            .to_string(),
        JobStatus::Completed => ProgressStage::Complete.message().to_string(),
        JobStatus::Failed => job
            .error
            .clone()
            .unwrap_or_else(|| ProgressStage::Error.message().to_string()),
    }
}
