use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    AnalysisClient, Completion, MediaPayload, TranscriptionEngine, TranscriptionOptions,
};
use crate::domain::MediaArtifact;

use super::PipelineError;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "Analyze the provided {source} and write a structured \
report in Markdown with a summary, key points and notable quotes.\n{instructions}";

pub enum AnalysisInput<'a> {
    Text(&'a str),
    Artifact(&'a MediaArtifact),
}

/// Single-attempt calls to the external transcription and generative services,
/// with their outcomes normalized to [`PipelineError`].
pub struct InvocationAdapter {
    transcription_engine: Arc<dyn TranscriptionEngine>,
    analysis_client: Arc<dyn AnalysisClient>,
    prompt_template: String,
    timeout: Duration,
}

impl InvocationAdapter {
    pub fn new(
        transcription_engine: Arc<dyn TranscriptionEngine>,
        analysis_client: Arc<dyn AnalysisClient>,
        prompt_template: String,
        timeout: Duration,
    ) -> Self {
        Self {
            transcription_engine,
            analysis_client,
            prompt_template,
            timeout,
        }
    }

    pub async fn transcribe(
        &self,
        artifact: &MediaArtifact,
        options: &TranscriptionOptions,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        let call = self.transcription_engine.transcribe(artifact, options);
        let text = self.bounded("transcription", cancel, call).await??;
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::EmptyResult {
                stage: "transcription",
            });
        }
        Ok(text.to_string())
    }

    pub async fn analyze(
        &self,
        input: AnalysisInput<'_>,
        instructions: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        let (prompt, media) = match input {
            AnalysisInput::Text(text) => {
                let prompt = render_prompt(&self.prompt_template, "text", instructions);
                (format!("{}\n\n---\n{}", prompt, text), None)
            }
            AnalysisInput::Artifact(artifact) => {
                let data = tokio::fs::read(&artifact.path)
                    .await
                    .map_err(|e| PipelineError::Upstream(format!("reading artifact: {}", e)))?;
                let media = MediaPayload {
                    mime_type: artifact.mime_type().to_string(),
                    data,
                };
                let prompt = render_prompt(&self.prompt_template, "audio recording", instructions);
                (prompt, Some(media))
            }
        };

        let call = self.analysis_client.generate(&prompt, media);
        let completion = self.bounded("analysis", cancel, call).await??;
        classify_completion(completion)
    }

    async fn bounded<T>(
        &self,
        stage: &'static str,
        cancel: &CancellationToken,
        call: impl Future<Output = T>,
    ) -> Result<T, PipelineError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, call) => outcome.map_err(|_| {
                PipelineError::Timeout {
                    stage,
                    seconds: self.timeout.as_secs(),
                }
            }),
        }
    }
}

fn classify_completion(completion: Completion) -> Result<String, PipelineError> {
    if let Some(reason) = completion.block_reason {
        return Err(PipelineError::ContentBlocked(reason));
    }
    match completion.text.map(|t| t.trim().to_string()) {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(PipelineError::EmptyResult { stage: "analysis" }),
    }
}

pub fn render_prompt(template: &str, source: &str, instructions: Option<&str>) -> String {
    let instructions = instructions.map(str::trim).unwrap_or_default();
    template
        .replace("{source}", source)
        .replace("{instructions}", instructions)
        .trim()
        .to_string()
}
