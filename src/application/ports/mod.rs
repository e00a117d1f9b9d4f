mod analysis_client;
mod audio_transcoder;
mod job_notifier;
mod job_repository;
mod media_downloader;
mod repository_error;
mod transcription_engine;

pub use analysis_client::{AnalysisClient, AnalysisError, Completion, MediaPayload};
pub use audio_transcoder::{AudioTranscoder, ExtractionOptions, TranscodeError};
pub use job_notifier::{JobEvent, JobNotifier};
pub use job_repository::{DEFAULT_LIST_LIMIT, JobFilter, JobRepository, MAX_LIST_LIMIT};
pub use media_downloader::{AcquisitionError, AcquisitionRequest, MediaDownloader};
pub use repository_error::RepositoryError;
pub use transcription_engine::{TranscriptionEngine, TranscriptionError, TranscriptionOptions};
