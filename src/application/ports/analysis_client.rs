use async_trait::async_trait;

/// Inline binary attachment sent along with the prompt.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: Option<String>,
    /// Set when the upstream safety filter withheld the answer.
    pub block_reason: Option<String>,
}

#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        media: Option<MediaPayload>,
    ) -> Result<Completion, AnalysisError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("content blocked: {0}")]
    ContentBlocked(String),
    #[error("analysis service returned no text")]
    EmptyResult,
    #[error("rate limited")]
    RateLimited,
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
