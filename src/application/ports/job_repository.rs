use async_trait::async_trait;

use crate::domain::{Job, JobId, JobStatus, JobType};

use super::RepositoryError;

pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const MAX_LIST_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobFilter {
    pub job_type: Option<JobType>,
    pub status: Option<JobStatus>,
    pub limit: usize,
}

impl JobFilter {
    pub fn new(job_type: Option<JobType>, status: Option<JobStatus>, limit: Option<usize>) -> Self {
        Self {
            job_type,
            status,
            limit: limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT),
        }
    }

    pub fn matches(&self, job: &Job) -> bool {
        self.job_type.is_none_or(|t| t == job.job_type)
            && self.status.is_none_or(|s| s == job.status)
    }
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError>;

    /// Persists `job` unless the stored row is already terminal.
    /// Returns `false` when the write was refused for that reason.
    /// Stored progress never decreases, even for a write built from a stale read.
    async fn update(&self, job: &Job) -> Result<bool, RepositoryError>;

    /// Jobs matching `filter`, newest `created_at` first.
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, RepositoryError>;

    async fn delete(&self, id: JobId) -> Result<bool, RepositoryError>;
}
