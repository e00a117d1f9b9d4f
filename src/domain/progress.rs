use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Validating,
    Downloading,
    Processing,
    Analyzing,
    AnalyzingPending,
    Complete,
    Error,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Validating => "validating",
            ProgressStage::Downloading => "downloading",
            ProgressStage::Processing => "processing",
            ProgressStage::Analyzing => "analyzing",
            ProgressStage::AnalyzingPending => "analyzing_pending",
            ProgressStage::Complete => "complete",
            ProgressStage::Error => "error",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ProgressStage::Validating => "Validating request",
            ProgressStage::Downloading => "Downloading media",
            ProgressStage::Processing => "Extracting audio",
            ProgressStage::Analyzing => "Submitting to the service",
            ProgressStage::AnalyzingPending => "Waiting for the service response",
            ProgressStage::Complete => "Completed",
            ProgressStage::Error => "Failed",
        }
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Process-local view of a running job, used only for advisory ETA display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub stage: ProgressStage,
    pub progress: u8,
    pub estimated_seconds_remaining: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub content_seconds: Option<f64>,
    pub media_kind: MediaKind,
}
