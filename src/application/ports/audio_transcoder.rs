use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{AudioFormat, AudioQuality, JobId, MediaArtifact};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExtractionOptions {
    pub format: AudioFormat,
    pub quality: AudioQuality,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

impl ExtractionOptions {
    /// Seek offset and clip length derived from the requested range.
    pub fn clip(&self) -> Result<(Option<f64>, Option<f64>), TranscodeError> {
        let start = self.start_time.unwrap_or(0.0);
        if start < 0.0 {
            return Err(TranscodeError::InvalidRange(format!("start {} is negative", start)));
        }
        let length = match self.end_time {
            Some(end) if end <= start => {
                return Err(TranscodeError::InvalidRange(format!(
                    "end {} is not after start {}",
                    end, start
                )));
            }
            Some(end) => Some(end - start),
            None => None,
        };
        Ok((self.start_time.filter(|s| *s > 0.0), length))
    }
}

#[async_trait]
pub trait AudioTranscoder: Send + Sync {
    /// Produces an audio artifact with its duration probed.
    async fn extract(
        &self,
        job_id: JobId,
        source: &Path,
        options: &ExtractionOptions,
        cancel: &CancellationToken,
    ) -> Result<MediaArtifact, TranscodeError>;

    /// Content duration of a media file in seconds.
    async fn probe_duration(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<f64, TranscodeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("transcoder exited with {code:?}: {diagnostics}")]
    TranscoderFailed {
        code: Option<i32>,
        diagnostics: String,
    },
    #[error("transcoder produced no output file")]
    MissingOutput,
    #[error("metadata probe failed: {0}")]
    ProbeFailed(String),
    #[error("invalid time range: {0}")]
    InvalidRange(String),
    #[error("artifact is {size_bytes} bytes, limit is {limit_bytes}")]
    PayloadTooLarge { size_bytes: u64, limit_bytes: u64 },
    #[error("transcoding timed out after {0:?}")]
    Timeout(Duration),
    #[error("transcoding cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
