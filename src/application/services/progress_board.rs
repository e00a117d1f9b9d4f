use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::application::ports::{JobEvent, JobNotifier};
use crate::domain::{JobId, MediaKind, ProgressSnapshot, ProgressStage};

use super::progress_estimator;

/// Content length assumed for ETA until the real duration is probed.
const DEFAULT_CONTENT_SECONDS: f64 = 300.0;

#[derive(Debug, Clone)]
struct Entry {
    stage: ProgressStage,
    progress: u8,
    started_at: DateTime<Utc>,
    content_seconds: Option<f64>,
    media_kind: MediaKind,
}

/// In-process progress view fed by job events. Terminal jobs are dropped.
#[derive(Debug, Default)]
pub struct ProgressBoard {
    entries: RwLock<HashMap<JobId, Entry>>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, job_id: JobId) -> Option<ProgressSnapshot> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(&job_id)?;
        let content_seconds = entry.content_seconds.unwrap_or(DEFAULT_CONTENT_SECONDS);
        let eta = progress_estimator::estimate_time_remaining(
            f64::from(entry.progress),
            entry.started_at,
            content_seconds / 60.0,
            entry.media_kind,
        );
        Some(ProgressSnapshot {
            stage: entry.stage,
            progress: entry.progress,
            estimated_seconds_remaining: Some(eta.round() as u64),
            started_at: entry.started_at,
            content_seconds: entry.content_seconds,
            media_kind: entry.media_kind,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobNotifier for ProgressBoard {
    fn notify(&self, event: &JobEvent) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if event.status.is_terminal() {
            entries.remove(&event.job_id);
            return;
        }
        let entry = entries.entry(event.job_id).or_insert_with(|| Entry {
            stage: ProgressStage::Validating,
            progress: 0,
            started_at: event.at,
            content_seconds: None,
            media_kind: MediaKind::Audio,
        });
        if let Some(stage) = event.stage {
            entry.stage = stage;
        }
        if let Some(kind) = event.media_kind {
            entry.media_kind = kind;
        }
        if event.content_seconds.is_some() {
            entry.content_seconds = event.content_seconds;
        }
        entry.progress = entry.progress.max(event.progress);
    }

    fn job_removed(&self, job_id: JobId) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&job_id);
    }
}
