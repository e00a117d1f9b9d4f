mod cancellation_registry;
mod cleanup_scope;
mod invocation_adapter;
mod job_status_controller;
mod media_pipeline;
mod pipeline_error;
mod progress_board;
pub mod progress_estimator;

pub use cancellation_registry::{CancellationRegistration, CancellationRegistry};
pub use cleanup_scope::{CleanupReport, CleanupScope};
pub use invocation_adapter::{
    AnalysisInput, DEFAULT_PROMPT_TEMPLATE, InvocationAdapter, render_prompt,
};
pub use job_status_controller::{
    CANCELLED_MESSAGE, JobControllerError, JobStatusController, ProgressReport,
};
pub use media_pipeline::{
    MediaPipeline, MediaSource, PipelineLimits, PipelineOutput, PipelineRequest,
};
pub use pipeline_error::PipelineError;
pub use progress_board::ProgressBoard;
