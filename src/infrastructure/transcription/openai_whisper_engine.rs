use async_trait::async_trait;
use reqwest::multipart;
use tracing::instrument;

use crate::application::ports::{TranscriptionEngine, TranscriptionError, TranscriptionOptions};
use crate::domain::MediaArtifact;
use crate::infrastructure::observability::sanitize_prompt;

pub const DEFAULT_WHISPER_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_WHISPER_MODEL: &str = "whisper-1";

/// Speech-to-text through an OpenAI-compatible `/audio/transcriptions` endpoint.
pub struct OpenAiWhisperEngine {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiWhisperEngine {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_WHISPER_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| DEFAULT_WHISPER_MODEL.to_string()),
        }
    }
}

#[async_trait]
impl TranscriptionEngine for OpenAiWhisperEngine {
    #[instrument(skip_all, fields(model = %self.model, size_bytes = artifact.size_bytes))]
    async fn transcribe(
        &self,
        artifact: &MediaArtifact,
        options: &TranscriptionOptions,
    ) -> Result<String, TranscriptionError> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        let audio = tokio::fs::read(&artifact.path).await?;

        let file_part = multipart::Part::bytes(audio)
            .file_name(artifact.file_name())
            .mime_str(artifact.mime_type())
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("mime: {}", e)))?;

        let mut form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "text")
            .part("file", file_part);
        if let Some(language) = options.language.as_deref().filter(|l| !l.is_empty()) {
            form = form.text("language", language.to_string());
        }
        if let Some(prompt) = options.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            tracing::debug!(prompt = %sanitize_prompt(prompt), "Sending transcription prompt");
            form = form.text("prompt", prompt.to_string());
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("request: {}", e)))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TranscriptionError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscriptionError::ApiRequestFailed(format!(
                "status {}: {}",
                status,
                sanitize_prompt(&body)
            )));
        }

        let transcript = response
            .text()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("body: {}", e)))?;

        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(TranscriptionError::EmptyResult);
        }

        tracing::info!(chars = transcript.len(), "Whisper transcription completed");

        Ok(transcript.to_string())
    }
}
