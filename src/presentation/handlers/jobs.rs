use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::application::ports::JobFilter;
use crate::domain::{Job, JobId, JobResult, JobStatus, JobType, JobUpdate};
use crate::presentation::state::AppState;

use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct JobIdQuery {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub id: String,
    pub status: String,
    pub progress: Option<u8>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub id: String,
}

pub fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse::<JobId>()
        .map_err(|_| ApiError::bad_request(format!("Invalid job ID: {}", raw)))
}

/// `GET /jobs?id=` returns one job; without `id` the filtered list, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_jobs_handler(
    State(state): State<AppState>,
    Query(query): Query<JobsQuery>,
) -> Result<Response, ApiError> {
    if let Some(raw) = query.id.as_deref() {
        let job = state.controller.get_job(parse_job_id(raw)?).await?;
        return Ok((StatusCode::OK, Json(job)).into_response());
    }

    let job_type = query
        .job_type
        .as_deref()
        .map(str::parse::<JobType>)
        .transpose()
        .map_err(ApiError::bad_request)?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()
        .map_err(ApiError::bad_request)?;

    let filter = JobFilter::new(job_type, status, query.limit);
    let jobs = state.controller.list_jobs(&filter).await?;
    Ok((
        StatusCode::OK,
        Json(JobListResponse {
            count: jobs.len(),
            jobs,
        }),
    )
        .into_response())
}

#[tracing::instrument(skip(state, request), fields(job_id = %request.id, status = %request.status))]
pub async fn update_job_handler(
    State(state): State<AppState>,
    Json(request): Json<UpdateJobRequest>,
) -> Result<Response, ApiError> {
    let id = parse_job_id(&request.id)?;
    let status = request
        .status
        .parse::<JobStatus>()
        .map_err(ApiError::bad_request)?;

    let update = JobUpdate {
        status,
        progress: request.progress,
        result: request.result,
        error: request.error,
    };
    let job = state
        .controller
        .update_status(id, update)
        .await
        .map_err(|e| ApiError::from(e).with_job(id))?;
    Ok((StatusCode::OK, Json(job)).into_response())
}

#[tracing::instrument(skip(state))]
pub async fn delete_job_handler(
    State(state): State<AppState>,
    Query(query): Query<JobIdQuery>,
) -> Result<Response, ApiError> {
    let id = parse_job_id(&query.id)?;
    state.controller.delete_job(id).await?;
    Ok((
        StatusCode::OK,
        Json(DeleteResponse {
            success: true,
            id: id.to_string(),
        }),
    )
        .into_response())
}

/// Fails the job with the cancellation marker and stops its running pipeline.
#[tracing::instrument(skip(state))]
pub async fn cancel_job_handler(
    State(state): State<AppState>,
    Query(query): Query<JobIdQuery>,
) -> Result<Response, ApiError> {
    let id = parse_job_id(&query.id)?;
    let job = state.controller.cancel_job(id).await?;
    Ok((StatusCode::OK, Json(job)).into_response())
}
