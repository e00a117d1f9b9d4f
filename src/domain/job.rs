use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{JobResult, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Transcription,
    Analysis,
    Download,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Transcription => "transcription",
            JobType::Analysis => "analysis",
            JobType::Download => "download",
        }
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transcription" => Ok(JobType::Transcription),
            "analysis" => Ok(JobType::Analysis),
            "download" => Ok(JobType::Download),
            _ => Err(format!("Invalid job type: {}", s)),
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Free-form request context recorded with a job (source, requested format, hints).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobMetadata(BTreeMap<String, String>);

impl JobMetadata {
    pub const SOURCE: &'static str = "source";
    pub const SOURCE_URL: &'static str = "source_url";
    pub const FILE_NAME: &'static str = "file_name";
    pub const FORMAT: &'static str = "format";
    pub const QUALITY: &'static str = "quality";
    pub const LANGUAGE: &'static str = "language";
    pub const MEDIA_KIND: &'static str = "media_kind";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn source_url(&self) -> Option<&str> {
        self.get(Self::SOURCE_URL)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    pub progress: u8,
    pub result: Option<JobResult>,
    pub error: Option<String>,
    pub metadata: JobMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_type: JobType, metadata: JobMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            job_type,
            status: JobStatus::Pending,
            progress: 0,
            result: None,
            error: None,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validates `update` against the lifecycle rules and returns the job it produces.
    pub fn apply(&self, update: JobUpdate) -> Result<Job, TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::Terminal(self.status));
        }
        if !self.status.can_transition_to(update.status) {
            return Err(TransitionError::Illegal {
                from: self.status,
                to: update.status,
            });
        }

        let mut next = self.clone();
        next.status = update.status;
        next.updated_at = Utc::now();
        if let Some(progress) = update.progress {
            next.progress = self.progress.max(progress.min(100));
        }

        match update.status {
            JobStatus::Completed => {
                if update.error.is_some() {
                    return Err(TransitionError::ErrorWithoutFailure);
                }
                let result = update.result.ok_or(TransitionError::MissingResult)?;
                if result.job_type() != self.job_type {
                    return Err(TransitionError::ResultMismatch {
                        expected: self.job_type,
                        actual: result.job_type(),
                    });
                }
                next.result = Some(result);
                next.progress = 100;
            }
            JobStatus::Failed => {
                if update.result.is_some() {
                    return Err(TransitionError::ResultWithoutCompletion);
                }
                let message = update
                    .error
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "unknown error".to_string());
                next.error = Some(message);
            }
            JobStatus::Pending | JobStatus::Processing => {
                if update.result.is_some() {
                    return Err(TransitionError::ResultWithoutCompletion);
                }
                if update.error.is_some() {
                    return Err(TransitionError::ErrorWithoutFailure);
                }
            }
        }

        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub progress: Option<u8>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn processing(progress: u8) -> Self {
        Self {
            status: JobStatus::Processing,
            progress: Some(progress),
            result: None,
            error: None,
        }
    }

    pub fn completed(result: JobResult) -> Self {
        Self {
            status: JobStatus::Completed,
            progress: Some(100),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            progress: None,
            result: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("job is already {0}")]
    Terminal(JobStatus),
    #[error("illegal transition from {from} to {to}")]
    Illegal { from: JobStatus, to: JobStatus },
    #[error("completed jobs require a result")]
    MissingResult,
    #[error("result of type {actual} does not match job type {expected}")]
    ResultMismatch { expected: JobType, actual: JobType },
    #[error("a result may only be recorded on completion")]
    ResultWithoutCompletion,
    #[error("an error may only be recorded on failure")]
    ErrorWithoutFailure,
}
