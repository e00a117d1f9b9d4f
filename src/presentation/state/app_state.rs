use std::sync::Arc;

use crate::application::services::{JobStatusController, MediaPipeline, ProgressBoard};
use crate::infrastructure::notifications::BroadcastNotifier;
use crate::presentation::config::PipelineSettings;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<JobStatusController>,
    pub pipeline: Arc<MediaPipeline>,
    pub progress_board: Arc<ProgressBoard>,
    pub events: Arc<BroadcastNotifier>,
    pub pipeline_settings: Arc<PipelineSettings>,
}
