use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::application::ports::{AnalysisClient, AnalysisError, Completion, MediaPayload};
use crate::infrastructure::observability::sanitize_prompt;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

/// Generative analysis through the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        }
    }
}

#[async_trait]
impl AnalysisClient for GeminiClient {
    #[instrument(skip_all, fields(model = %self.model, has_media = media.is_some()))]
    async fn generate(
        &self,
        prompt: &str,
        media: Option<MediaPayload>,
    ) -> Result<Completion, AnalysisError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let mut parts = vec![Part::Text { text: prompt }];
        if let Some(payload) = media.as_ref() {
            parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type: &payload.mime_type,
                    data: STANDARD.encode(&payload.data),
                },
            });
        }
        let request_body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
        };

        tracing::debug!(prompt = %sanitize_prompt(prompt), "Sending analysis request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AnalysisError::ApiRequestFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AnalysisError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::ApiRequestFailed(format!(
                "HTTP {}: {}",
                status,
                sanitize_prompt(&body)
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;

        Ok(into_completion(generated))
    }
}

fn into_completion(response: GenerateResponse) -> Completion {
    let prompt_block = response.prompt_feedback.and_then(|f| f.block_reason);
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Completion {
            text: None,
            block_reason: prompt_block,
        };
    };

    let candidate_block = candidate
        .finish_reason
        .filter(|r| BLOCKING_FINISH_REASONS.contains(&r.as_str()));
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    Completion {
        text: Some(text).filter(|t| !t.trim().is_empty()),
        block_reason: prompt_block.or(candidate_block),
    }
}
