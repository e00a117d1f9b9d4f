use std::io;
use std::path::{Path, PathBuf};

use crate::domain::JobId;

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: usize,
    pub already_gone: usize,
    pub failed: Vec<(PathBuf, String)>,
}

/// Tracks every transient file a job run owns and deletes them when the run
/// ends. Files are removed in reverse registration order; if the scope is
/// dropped without [`CleanupScope::finish`] (panic, aborted task) the removal
/// happens synchronously in `Drop`.
#[derive(Debug)]
pub struct CleanupScope {
    job_id: JobId,
    entries: Vec<PathBuf>,
}

impl CleanupScope {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            entries: Vec::new(),
        }
    }

    /// Registers `path` for deletion. A path is tracked once no matter how
    /// many stages hand it on; returns `false` when it was already tracked.
    pub fn register(&mut self, path: &Path) -> bool {
        if self.entries.iter().any(|p| p == path) {
            return false;
        }
        tracing::debug!(job_id = %self.job_id, path = %path.display(), "Artifact registered for cleanup");
        self.entries.push(path.to_path_buf());
        true
    }

    pub fn tracked(&self) -> &[PathBuf] {
        &self.entries
    }

    pub async fn finish(mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        while let Some(path) = self.entries.pop() {
            let outcome = tokio::fs::remove_file(&path).await;
            record(&mut report, self.job_id, path, outcome);
        }
        if !report.failed.is_empty() {
            tracing::warn!(
                job_id = %self.job_id,
                failed = report.failed.len(),
                "Some job artifacts could not be removed"
            );
        }
        report
    }
}

impl Drop for CleanupScope {
    fn drop(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        tracing::warn!(
            job_id = %self.job_id,
            pending = self.entries.len(),
            "Cleanup scope dropped before finishing, removing artifacts"
        );
        let mut report = CleanupReport::default();
        while let Some(path) = self.entries.pop() {
            let outcome = std::fs::remove_file(&path);
            record(&mut report, self.job_id, path, outcome);
        }
    }
}

fn record(report: &mut CleanupReport, job_id: JobId, path: PathBuf, outcome: io::Result<()>) {
    match outcome {
        Ok(()) => {
            tracing::debug!(job_id = %job_id, path = %path.display(), "Artifact removed");
            report.removed += 1;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => report.already_gone += 1,
        Err(e) => {
            tracing::warn!(job_id = %job_id, path = %path.display(), error = %e, "Failed to remove artifact");
            report.failed.push((path, e.to_string()));
        }
    }
}
