use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::ports::{JobFilter, JobRepository, RepositoryError};
use crate::domain::{Job, JobId};

/// Process-local job store, used when no database is configured and in tests.
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(RepositoryError::Duplicate(job.id.to_string()));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn update(&self, job: &Job) -> Result<bool, RepositoryError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(stored) if stored.status.is_terminal() => Ok(false),
            Some(stored) => {
                let progress = stored.progress.max(job.progress);
                *stored = job.clone();
                stored.progress = progress;
                Ok(true)
            }
            None => Err(RepositoryError::QueryFailed(format!(
                "job {} does not exist",
                job.id
            ))),
        }
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, RepositoryError> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<Job> = jobs.values().filter(|j| filter.matches(j)).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        matching.truncate(filter.limit);
        Ok(matching)
    }

    async fn delete(&self, id: JobId) -> Result<bool, RepositoryError> {
        Ok(self.jobs.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobMetadata, JobStatus, JobType, JobUpdate};

    #[tokio::test]
    async fn given_terminal_job_when_updating_then_write_is_refused() {
        let repository = InMemoryJobRepository::new();
        let job = Job::new(JobType::Transcription, JobMetadata::new());
        repository.create(&job).await.unwrap();

        let processing = job.apply(JobUpdate::processing(10)).unwrap();
        assert!(repository.update(&processing).await.unwrap());
        let failed = processing.apply(JobUpdate::failed("boom")).unwrap();
        assert!(repository.update(&failed).await.unwrap());

        let late = processing.apply(JobUpdate::processing(50)).unwrap();
        assert!(!repository.update(&late).await.unwrap());
        let stored = repository.get_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn given_stale_lower_progress_when_updating_then_stored_progress_is_kept() {
        let repository = InMemoryJobRepository::new();
        let job = Job::new(JobType::Transcription, JobMetadata::new());
        repository.create(&job).await.unwrap();
        let stale = job.apply(JobUpdate::processing(45)).unwrap();
        let fresh = job.apply(JobUpdate::processing(60)).unwrap();

        assert!(repository.update(&fresh).await.unwrap());
        assert!(repository.update(&stale).await.unwrap());

        let stored = repository.get_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.progress, 60);
    }

    #[tokio::test]
    async fn given_many_jobs_when_listing_with_limit_then_newest_first_and_truncated() {
        let repository = InMemoryJobRepository::new();
        let mut ids = Vec::new();
        for offset in 0..5 {
            let mut job = Job::new(JobType::Download, JobMetadata::new());
            job.created_at += chrono::Duration::seconds(offset);
            ids.push(job.id);
            repository.create(&job).await.unwrap();
        }

        let listed = repository
            .list(&JobFilter::new(None, None, Some(3)))
            .await
            .unwrap();

        let listed_ids: Vec<JobId> = listed.iter().map(|j| j.id).collect();
        assert_eq!(listed_ids, vec![ids[4], ids[3], ids[2]]);
    }
}
