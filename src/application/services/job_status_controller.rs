use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use crate::application::ports::{JobEvent, JobFilter, JobNotifier, JobRepository, RepositoryError};
use crate::domain::{
    Job, JobId, JobMetadata, JobStatus, JobType, JobUpdate, MediaKind, ProgressStage,
    TransitionError,
};

use super::CancellationRegistry;

pub const CANCELLED_MESSAGE: &str = "cancelled by user";

/// Stage-level context attached to a progress write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    pub stage: ProgressStage,
    pub progress: u8,
    pub media_kind: Option<MediaKind>,
    pub content_seconds: Option<f64>,
}

impl ProgressReport {
    pub fn new(stage: ProgressStage, progress: u8) -> Self {
        Self {
            stage,
            progress,
            media_kind: None,
            content_seconds: None,
        }
    }

    pub fn with_media_kind(mut self, kind: MediaKind) -> Self {
        self.media_kind = Some(kind);
        self
    }

    pub fn with_content_seconds(mut self, seconds: Option<f64>) -> Self {
        self.content_seconds = seconds;
        self
    }
}

/// Sole writer of job records. Enforces the forward-only lifecycle and fans
/// accepted writes out to the registered notifiers.
pub struct JobStatusController {
    repository: Arc<dyn JobRepository>,
    notifiers: Vec<Arc<dyn JobNotifier>>,
    cancellations: Arc<CancellationRegistry>,
}

impl JobStatusController {
    pub fn new(repository: Arc<dyn JobRepository>) -> Self {
        Self {
            repository,
            notifiers: Vec::new(),
            cancellations: Arc::new(CancellationRegistry::default()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn JobNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn cancellations(&self) -> &Arc<CancellationRegistry> {
        &self.cancellations
    }

    #[instrument(skip_all, fields(job_type = %job_type))]
    pub async fn create_job(
        &self,
        job_type: JobType,
        metadata: JobMetadata,
    ) -> Result<Job, JobControllerError> {
        let job = Job::new(job_type, metadata);
        self.repository.create(&job).await?;
        tracing::info!(job_id = %job.id, "Job created");
        self.publish(&job, None);
        Ok(job)
    }

    pub async fn get_job(&self, id: JobId) -> Result<Job, JobControllerError> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(JobControllerError::NotFound(id))
    }

    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, JobControllerError> {
        Ok(self.repository.list(filter).await?)
    }

    #[instrument(skip_all, fields(job_id = %id))]
    pub async fn delete_job(&self, id: JobId) -> Result<(), JobControllerError> {
        if !self.repository.delete(id).await? {
            return Err(JobControllerError::NotFound(id));
        }
        let signalled = self.cancellations.cancel(id);
        for notifier in &self.notifiers {
            notifier.job_removed(id);
        }
        tracing::info!(signalled, "Job deleted");
        Ok(())
    }

    /// Applies `update`. Writes against a terminal job are dropped and the
    /// stored job is returned unchanged.
    #[instrument(skip_all, fields(job_id = %id, status = %update.status))]
    pub async fn update_status(
        &self,
        id: JobId,
        update: JobUpdate,
    ) -> Result<Job, JobControllerError> {
        self.write(id, update, None).await
    }

    pub async fn report_progress(
        &self,
        id: JobId,
        report: ProgressReport,
    ) -> Result<Job, JobControllerError> {
        tracing::debug!(job_id = %id, stage = %report.stage, progress = report.progress, "Job progress");
        self.write(id, JobUpdate::processing(report.progress), Some(report))
            .await
    }

    /// Moves a live job to `failed`, passing through `processing` when the
    /// job never started.
    pub async fn fail_job(&self, id: JobId, message: &str) -> Result<Job, JobControllerError> {
        let job = self.get_job(id).await?;
        if job.status.is_terminal() {
            return Ok(job);
        }
        if job.status == JobStatus::Pending {
            let update = JobUpdate {
                status: JobStatus::Processing,
                progress: None,
                result: None,
                error: None,
            };
            self.write(id, update, None).await?;
        }
        self.write(id, JobUpdate::failed(message), None).await
    }

    /// Fails the job with a cancellation marker and stops its running pipeline.
    #[instrument(skip_all, fields(job_id = %id))]
    pub async fn cancel_job(&self, id: JobId) -> Result<Job, JobControllerError> {
        let outcome = self.fail_job(id, CANCELLED_MESSAGE).await;
        let signalled = self.cancellations.cancel(id);
        tracing::info!(signalled, "Job cancellation requested");
        outcome
    }

    async fn write(
        &self,
        id: JobId,
        update: JobUpdate,
        report: Option<ProgressReport>,
    ) -> Result<Job, JobControllerError> {
        let current = self.get_job(id).await?;

        let next = match current.apply(update) {
            Ok(next) => next,
            Err(TransitionError::Terminal(status)) => {
                tracing::warn!(job_id = %id, status = %status, "Ignoring write to terminal job");
                return Ok(current);
            }
            Err(e) => return Err(JobControllerError::InvalidUpdate(e)),
        };

        if !self.repository.update(&next).await? {
            let stored = self.get_job(id).await?;
            tracing::warn!(
                job_id = %id,
                status = %stored.status,
                "Job became terminal concurrently, write dropped"
            );
            return Ok(stored);
        }

        self.publish(&next, report);
        Ok(next)
    }

    fn publish(&self, job: &Job, report: Option<ProgressReport>) {
        if self.notifiers.is_empty() {
            return;
        }
        let stage = match job.status {
            JobStatus::Completed => Some(ProgressStage::Complete),
            JobStatus::Failed => Some(ProgressStage::Error),
            _ => report.map(|r| r.stage),
        };
        let event = JobEvent {
            job_id: job.id,
            job_type: job.job_type,
            status: job.status,
            progress: job.progress,
            stage,
            media_kind: report.and_then(|r| r.media_kind),
            content_seconds: report.and_then(|r| r.content_seconds),
            error: job.error.clone(),
            at: Utc::now(),
        };
        for notifier in &self.notifiers {
            notifier.notify(&event);
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobControllerError {
    #[error("job store unavailable: {0}")]
    Persistence(#[from] RepositoryError),
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("invalid update: {0}")]
    InvalidUpdate(TransitionError),
}
