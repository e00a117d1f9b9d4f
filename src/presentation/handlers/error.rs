use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::services::{JobControllerError, PipelineError};
use crate::domain::JobId;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub error: String,
}

/// Handler failure rendered as `{success: false, job_id?, error}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub job_id: Option<JobId>,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            job_id: None,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn with_job(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                success: false,
                job_id: self.job_id.map(|id| id.to_string()),
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub fn pipeline_status(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::InvalidSource(_) => StatusCode::BAD_REQUEST,
        PipelineError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        PipelineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        PipelineError::Acquisition(_) | PipelineError::Upstream(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Transcode(_)
        | PipelineError::EmptyResult { .. }
        | PipelineError::ContentBlocked(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::Cancelled => StatusCode::CONFLICT,
        PipelineError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::new(pipeline_status(&e), e.to_string())
    }
}

impl From<JobControllerError> for ApiError {
    fn from(e: JobControllerError) -> Self {
        match e {
            JobControllerError::NotFound(id) => {
                ApiError::new(StatusCode::NOT_FOUND, format!("Job not found: {}", id))
            }
            JobControllerError::InvalidUpdate(reason) => {
                ApiError::new(StatusCode::CONFLICT, format!("Invalid update: {}", reason))
            }
            JobControllerError::Persistence(inner) => {
                tracing::error!(error = %inner, "Job store unavailable");
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Job store unavailable")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_pipeline_errors_when_mapping_then_statuses_follow_the_stage() {
        assert_eq!(
            pipeline_status(&PipelineError::PayloadTooLarge("x".into())),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            pipeline_status(&PipelineError::Timeout {
                stage: "download",
                seconds: 1
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            pipeline_status(&PipelineError::ContentBlocked("SAFETY".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
