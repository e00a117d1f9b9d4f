use async_trait::async_trait;

use crate::domain::MediaArtifact;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptionOptions {
    pub language: Option<String>,
    pub prompt: Option<String>,
}

#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    async fn transcribe(
        &self,
        artifact: &MediaArtifact,
        options: &TranscriptionOptions,
    ) -> Result<String, TranscriptionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("transcription service returned no text")]
    EmptyResult,
    #[error("rate limited")]
    RateLimited,
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
