use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{AudioQuality, JobId, MediaArtifact, MediaKind};

#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    pub job_id: JobId,
    pub source_url: String,
    pub kind: MediaKind,
    pub quality: AudioQuality,
}

#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Fetches remote media into the temp root. Partial output is removed on failure.
    async fn acquire(
        &self,
        request: &AcquisitionRequest,
        cancel: &CancellationToken,
    ) -> Result<MediaArtifact, AcquisitionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("invalid source: {0}")]
    InvalidSource(String),
    #[error("downloader exited with {code:?}: {diagnostics}")]
    DownloaderFailed {
        code: Option<i32>,
        diagnostics: String,
    },
    #[error("downloader produced no output file")]
    MissingOutput,
    #[error("download is {size_bytes} bytes, limit is {limit_bytes}")]
    TooLarge { size_bytes: u64, limit_bytes: u64 },
    #[error("download timed out after {0:?}")]
    Timeout(Duration),
    #[error("download cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
