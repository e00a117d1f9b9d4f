use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use mediascribe::application::ports::JobRepository;
use mediascribe::application::services::{
    DEFAULT_PROMPT_TEMPLATE, InvocationAdapter, JobStatusController, MediaPipeline,
    PipelineLimits, ProgressBoard,
};
use mediascribe::infrastructure::analysis::GeminiClient;
use mediascribe::infrastructure::media::{
    FfmpegConfig, FfmpegTranscoder, YtDlpConfig, YtDlpDownloader,
};
use mediascribe::infrastructure::notifications::BroadcastNotifier;
use mediascribe::infrastructure::observability::{TracingConfig, init_tracing};
use mediascribe::infrastructure::persistence::{
    InMemoryJobRepository, PgJobRepository, create_pool,
};
use mediascribe::infrastructure::transcription::OpenAiWhisperEngine;
use mediascribe::presentation::{AppState, Settings, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (environment, settings) = Settings::load().context("Failed to load settings")?;

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;

    init_tracing(
        &TracingConfig {
            environment: environment.to_string(),
            filter: settings.logging.level.clone(),
            json_format: settings.logging.enable_json,
        },
        addr,
    );

    let repository: Arc<dyn JobRepository> = match settings.database.url.as_deref() {
        Some(url) => {
            let pool = create_pool(
                url,
                settings.database.max_connections,
                settings.database.connect_attempts,
            )
            .await
            .context("Failed to connect to the job store")?;
            let repository = PgJobRepository::new(pool);
            repository
                .migrate()
                .await
                .context("Failed to run job store migrations")?;
            Arc::new(repository)
        }
        None => {
            tracing::warn!("No database URL configured, jobs are kept in memory");
            Arc::new(InMemoryJobRepository::new())
        }
    };

    let progress_board = Arc::new(ProgressBoard::new());
    let events = Arc::new(BroadcastNotifier::default());
    let controller = Arc::new(
        JobStatusController::new(repository)
            .with_notifier(progress_board.clone())
            .with_notifier(events.clone()),
    );

    let pipeline_settings = settings.pipeline.clone();
    tokio::fs::create_dir_all(&pipeline_settings.temp_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create temp dir {}",
                pipeline_settings.temp_dir.display()
            )
        })?;

    let downloader = Arc::new(YtDlpDownloader::new(YtDlpConfig {
        binary: settings.tools.yt_dlp.clone(),
        temp_dir: pipeline_settings.temp_dir.clone(),
        max_download_bytes: pipeline_settings.max_download_bytes(),
        max_content_seconds: pipeline_settings.max_content_seconds,
        timeout: pipeline_settings.stage_timeout(),
    }));
    let transcoder = Arc::new(FfmpegTranscoder::new(FfmpegConfig {
        ffmpeg: settings.tools.ffmpeg.clone(),
        ffprobe: settings.tools.ffprobe.clone(),
        temp_dir: pipeline_settings.temp_dir.clone(),
        max_artifact_bytes: pipeline_settings.max_artifact_bytes(),
        timeout: pipeline_settings.stage_timeout(),
    }));

    if settings.transcription.api_key.is_empty() {
        tracing::warn!("Transcription API key is not set");
    }
    if settings.analysis.api_key.is_empty() {
        tracing::warn!("Analysis API key is not set");
    }
    let transcription_engine = Arc::new(OpenAiWhisperEngine::new(
        settings.transcription.api_key.clone(),
        settings.transcription.base_url.clone(),
        settings.transcription.model.clone(),
    ));
    let analysis_client = Arc::new(GeminiClient::new(
        settings.analysis.api_key.clone(),
        settings.analysis.base_url.clone(),
        settings.analysis.model.clone(),
    ));
    let invocation = Arc::new(InvocationAdapter::new(
        transcription_engine,
        analysis_client,
        settings
            .analysis
            .prompt_template
            .clone()
            .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
        pipeline_settings.stage_timeout(),
    ));

    let pipeline = Arc::new(MediaPipeline::new(
        controller.clone(),
        downloader,
        transcoder,
        invocation,
        PipelineLimits {
            max_artifact_bytes: pipeline_settings.max_artifact_bytes(),
            max_content_seconds: pipeline_settings.max_content_seconds as f64,
        },
    ));

    let state = AppState {
        controller,
        pipeline,
        progress_board,
        events,
        pipeline_settings: Arc::new(pipeline_settings),
    };

    let router = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
