use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{JobFilter, JobRepository, RepositoryError};
use crate::domain::{Job, JobId, JobMetadata, JobResult, JobStatus, JobType};

const SELECT_COLUMNS: &str =
    "id, job_type, status, progress, result, error, metadata, created_at, updated_at";

pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations in `migrations/`.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    #[instrument(skip(self, job), fields(job_id = %job.id.as_uuid()))]
    async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, job_type, status, progress, result, error, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.job_type.as_str())
        .bind(job.status.as_str())
        .bind(i16::from(job.progress))
        .bind(job.result.as_ref().map(Json))
        .bind(job.error.as_deref())
        .bind(Json(&job.metadata))
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Duplicate(job.id.to_string())
            }
            other => query_error(other),
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %id.as_uuid()))]
    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;

        row.as_ref().map(job_from_row).transpose()
    }

    #[instrument(skip(self, job), fields(job_id = %job.id.as_uuid(), status = %job.status))]
    async fn update(&self, job: &Job) -> Result<bool, RepositoryError> {
        let outcome = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, progress = GREATEST(progress, $2), result = $3, error = $4, updated_at = $5
            WHERE id = $6 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(job.status.as_str())
        .bind(i16::from(job.progress))
        .bind(job.result.as_ref().map(Json))
        .bind(job.error.as_deref())
        .bind(job.updated_at)
        .bind(job.id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(outcome.rows_affected() == 1)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit))]
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, RepositoryError> {
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM jobs
            WHERE ($1::text IS NULL OR job_type = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#
        ))
        .bind(filter.job_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        rows.iter().map(job_from_row).collect()
    }

    #[instrument(skip(self), fields(job_id = %id.as_uuid()))]
    async fn delete(&self, id: JobId) -> Result<bool, RepositoryError> {
        let outcome = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

        Ok(outcome.rows_affected() == 1)
    }
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::ConnectionFailed(e.to_string())
        }
        other => RepositoryError::QueryFailed(other.to_string()),
    }
}

fn job_from_row(row: &PgRow) -> Result<Job, RepositoryError> {
    let corrupt = |e: sqlx::Error| RepositoryError::CorruptRecord(e.to_string());

    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let job_type: String = row.try_get("job_type").map_err(corrupt)?;
    let status: String = row.try_get("status").map_err(corrupt)?;
    let progress: i16 = row.try_get("progress").map_err(corrupt)?;
    let result: Option<Json<JobResult>> = row.try_get("result").map_err(corrupt)?;
    let metadata: Json<JobMetadata> = row.try_get("metadata").map_err(corrupt)?;

    Ok(Job {
        id: JobId::from_uuid(id),
        job_type: job_type
            .parse::<JobType>()
            .map_err(RepositoryError::CorruptRecord)?,
        status: status
            .parse::<JobStatus>()
            .map_err(RepositoryError::CorruptRecord)?,
        progress: u8::try_from(progress.clamp(0, 100)).unwrap_or_default(),
        result: result.map(|Json(r)| r),
        error: row.try_get("error").map_err(corrupt)?,
        metadata: metadata.0,
        created_at: row.try_get("created_at").map_err(corrupt)?,
        updated_at: row.try_get("updated_at").map_err(corrupt)?,
    })
}
