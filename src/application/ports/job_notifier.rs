use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{JobId, JobStatus, JobType, MediaKind, ProgressStage};

/// Emitted for every accepted job write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub job_type: JobType,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<ProgressStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_kind: Option<MediaKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

pub trait JobNotifier: Send + Sync {
    fn notify(&self, event: &JobEvent);

    /// The job record was deleted; no further events follow for it.
    fn job_removed(&self, _job_id: JobId) {}
}
