mod job;
mod job_result;
mod job_status;
mod media;
mod progress;
mod source_url;

pub use job::{Job, JobId, JobMetadata, JobType, JobUpdate, TransitionError};
pub use job_result::{AnalysisResult, DownloadResult, JobResult, TranscriptionResult};
pub use job_status::JobStatus;
pub use media::{
    AudioFormat, AudioQuality, MediaArtifact, MediaKind, QualityPreset, mime_for_format,
};
pub use progress::{ProgressSnapshot, ProgressStage};
pub use source_url::SourceUrl;
