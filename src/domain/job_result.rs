use serde::{Deserialize, Serialize};

use super::{JobType, MediaKind};

/// Outcome of a completed job, one variant per [`JobType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResult {
    Transcription(TranscriptionResult),
    Analysis(AnalysisResult),
    Download(DownloadResult),
}

impl JobResult {
    pub fn job_type(&self) -> JobType {
        match self {
            JobResult::Transcription(_) => JobType::Transcription,
            JobResult::Analysis(_) => JobType::Analysis,
            JobResult::Download(_) => JobType::Download,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub duration_seconds: f64,
    pub word_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl TranscriptionResult {
    pub fn new(text: String, duration_seconds: f64, language: Option<String>) -> Self {
        let word_count = text.split_whitespace().count();
        Self {
            text,
            duration_seconds,
            word_count,
            language,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub markdown: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadResult {
    pub file_name: String,
    pub media_kind: MediaKind,
    pub format: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}
