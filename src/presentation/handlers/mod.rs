mod error;
mod events;
mod health;
mod job_status;
mod jobs;
mod submit;

pub use error::{ApiError, ErrorResponse, pipeline_status};
pub use events::job_events_handler;
pub use health::health_handler;
pub use job_status::{JobStatusResponse, job_status_handler};
pub use jobs::{
    cancel_job_handler, delete_job_handler, list_jobs_handler, parse_job_id, update_job_handler,
};
pub use submit::{
    AnalysisResponse, TranscriptionResponse, analyze_handler, download_handler, transcribe_handler,
};
