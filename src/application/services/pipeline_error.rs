use crate::application::ports::{AcquisitionError, AnalysisError, TranscodeError, TranscriptionError};

use super::JobControllerError;

/// Failure of a pipeline run. The `Display` text is what polling clients see
/// in `Job.error`, so it names the stage and never carries raw tool output.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid source: {0}")]
    InvalidSource(String),
    #[error("download failed: {0}")]
    Acquisition(String),
    #[error("audio extraction failed: {0}")]
    Transcode(String),
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },
    #[error("{stage} returned an empty result")]
    EmptyResult { stage: &'static str },
    #[error("content blocked by safety filter: {0}")]
    ContentBlocked(String),
    #[error("upstream service error: {0}")]
    Upstream(String),
    #[error("job store unavailable: {0}")]
    Persistence(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("job cancelled")]
    Cancelled,
    #[error("internal error")]
    Internal,
}

impl From<AcquisitionError> for PipelineError {
    fn from(e: AcquisitionError) -> Self {
        match e {
            AcquisitionError::InvalidSource(reason) => PipelineError::InvalidSource(reason),
            AcquisitionError::TooLarge { .. } => PipelineError::PayloadTooLarge(e.to_string()),
            AcquisitionError::Timeout(after) => PipelineError::Timeout {
                stage: "download",
                seconds: after.as_secs(),
            },
            AcquisitionError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Acquisition(other.to_string()),
        }
    }
}

impl From<TranscodeError> for PipelineError {
    fn from(e: TranscodeError) -> Self {
        match e {
            TranscodeError::PayloadTooLarge { .. } => PipelineError::PayloadTooLarge(e.to_string()),
            TranscodeError::Timeout(after) => PipelineError::Timeout {
                stage: "audio extraction",
                seconds: after.as_secs(),
            },
            TranscodeError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Transcode(other.to_string()),
        }
    }
}

impl From<TranscriptionError> for PipelineError {
    fn from(e: TranscriptionError) -> Self {
        match e {
            TranscriptionError::EmptyResult => PipelineError::EmptyResult {
                stage: "transcription",
            },
            other => PipelineError::Upstream(format!("transcription: {}", other)),
        }
    }
}

impl From<AnalysisError> for PipelineError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::ContentBlocked(reason) => PipelineError::ContentBlocked(reason),
            AnalysisError::EmptyResult => PipelineError::EmptyResult { stage: "analysis" },
            other => PipelineError::Upstream(format!("analysis: {}", other)),
        }
    }
}

impl From<JobControllerError> for PipelineError {
    fn from(e: JobControllerError) -> Self {
        match e {
            JobControllerError::NotFound(id) => PipelineError::NotFound(format!("job {}", id)),
            other => PipelineError::Persistence(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn given_download_timeout_when_converting_then_stage_is_named() {
        let err = PipelineError::from(AcquisitionError::Timeout(Duration::from_secs(90)));
        assert_eq!(err.to_string(), "download timed out after 90s");
    }

    #[test]
    fn given_oversized_extraction_when_converting_then_payload_too_large() {
        let err = PipelineError::from(TranscodeError::PayloadTooLarge {
            size_bytes: 30,
            limit_bytes: 25,
        });
        assert!(matches!(err, PipelineError::PayloadTooLarge(_)));
    }

    #[test]
    fn given_blocked_analysis_when_converting_then_reason_is_kept() {
        let err = PipelineError::from(AnalysisError::ContentBlocked("SAFETY".to_string()));
        assert_eq!(err.to_string(), "content blocked by safety filter: SAFETY");
    }
}
