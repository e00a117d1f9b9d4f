use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::handlers::{
    analyze_handler, cancel_job_handler, delete_job_handler, download_handler, health_handler,
    job_events_handler, job_status_handler, list_jobs_handler, transcribe_handler,
    update_job_handler,
};
use crate::presentation::state::AppState;

/// Room for multipart framing and the text fields around an upload.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let body_limit = usize::try_from(state.pipeline_settings.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/jobs",
            get(list_jobs_handler)
                .put(update_job_handler)
                .delete(delete_job_handler),
        )
        .route("/jobs/cancel", post(cancel_job_handler))
        .route("/job-status", get(job_status_handler))
        .route("/job-events", get(job_events_handler))
        .route("/transcribe", post(transcribe_handler))
        .route("/analyze", post(analyze_handler))
        .route("/download", post(download_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
