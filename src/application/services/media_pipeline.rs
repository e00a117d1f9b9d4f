use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::application::ports::{
    AcquisitionRequest, AudioTranscoder, ExtractionOptions, MediaDownloader, TranscriptionOptions,
};
use crate::domain::{
    AnalysisResult, DownloadResult, Job, JobId, JobResult, JobStatus, JobType, JobUpdate,
    MediaArtifact, MediaKind, ProgressStage, SourceUrl, TranscriptionResult,
};

use super::{
    AnalysisInput, CleanupScope, InvocationAdapter, JobStatusController, PipelineError,
    ProgressReport,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineLimits {
    pub max_artifact_bytes: u64,
    pub max_content_seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    /// Uploaded file in the temp root; owned and deleted by the job.
    Upload(PathBuf),
    /// Pre-existing server-side file; never deleted by the job.
    LocalFile(PathBuf),
    Remote(String),
    /// Raw text, analysis jobs only.
    Text(String),
}

#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub source: MediaSource,
    pub media_kind: MediaKind,
    pub extraction: ExtractionOptions,
    pub language: Option<String>,
    pub prompt: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PipelineOutput {
    Transcription(TranscriptionResult),
    Analysis(AnalysisResult),
    Download {
        result: DownloadResult,
        content: Bytes,
    },
}

impl PipelineOutput {
    pub fn job_result(&self) -> JobResult {
        match self {
            PipelineOutput::Transcription(result) => JobResult::Transcription(result.clone()),
            PipelineOutput::Analysis(result) => JobResult::Analysis(result.clone()),
            PipelineOutput::Download { result, .. } => JobResult::Download(result.clone()),
        }
    }
}

/// Drives one job through acquisition, audio extraction and invocation.
/// Stages run strictly in sequence; the first failure ends the job.
pub struct MediaPipeline {
    controller: Arc<JobStatusController>,
    downloader: Arc<dyn MediaDownloader>,
    transcoder: Arc<dyn AudioTranscoder>,
    invocation: Arc<InvocationAdapter>,
    limits: PipelineLimits,
}

impl MediaPipeline {
    pub fn new(
        controller: Arc<JobStatusController>,
        downloader: Arc<dyn MediaDownloader>,
        transcoder: Arc<dyn AudioTranscoder>,
        invocation: Arc<InvocationAdapter>,
        limits: PipelineLimits,
    ) -> Self {
        Self {
            controller,
            downloader,
            transcoder,
            invocation,
            limits,
        }
    }

    pub fn controller(&self) -> &Arc<JobStatusController> {
        &self.controller
    }

    /// Runs the job on its own task and waits for it. A panicking run still
    /// ends the job as failed.
    pub async fn run_detached(
        self: Arc<Self>,
        job: Job,
        request: PipelineRequest,
    ) -> Result<PipelineOutput, PipelineError> {
        let job_id = job.id;
        let pipeline = Arc::clone(&self);
        let handle = tokio::spawn(async move { pipeline.run(job, request).await });

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Pipeline task aborted");
                if let Err(write_err) = self.controller.fail_job(job_id, "internal error").await {
                    tracing::error!(job_id = %job_id, error = %write_err, "Failed to record aborted job");
                }
                Err(PipelineError::Internal)
            }
        }
    }

    pub async fn run(
        &self,
        job: Job,
        request: PipelineRequest,
    ) -> Result<PipelineOutput, PipelineError> {
        let span = tracing::info_span!(
            "media_job",
            job_id = %job.id,
            job_type = %job.job_type,
        );
        self.run_inner(job, request).instrument(span).await
    }

    async fn run_inner(
        &self,
        job: Job,
        request: PipelineRequest,
    ) -> Result<PipelineOutput, PipelineError> {
        let registration = self.controller.cancellations().register(job.id);
        let cancel = registration.token().clone();
        let mut scope = CleanupScope::new(job.id);
        if let MediaSource::Upload(path) = &request.source {
            scope.register(path);
        }

        tracing::info!("Pipeline started");
        let outcome = self.execute(&job, &request, &cancel, &mut scope).await;

        let report = scope.finish().await;
        drop(registration);
        tracing::debug!(
            removed = report.removed,
            failed = report.failed.len(),
            "Job artifacts cleaned up"
        );

        match outcome {
            Ok(output) => {
                let stored = self
                    .controller
                    .update_status(job.id, JobUpdate::completed(output.job_result()))
                    .await?;
                if stored.status != JobStatus::Completed {
                    tracing::warn!(status = %stored.status, "Job finished after being terminated");
                    return Err(PipelineError::Cancelled);
                }
                tracing::info!("Pipeline completed");
                Ok(output)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Pipeline failed");
                if let Err(write_err) = self.controller.fail_job(job.id, &e.to_string()).await {
                    tracing::error!(error = %write_err, "Failed to record job failure");
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        job: &Job,
        request: &PipelineRequest,
        cancel: &CancellationToken,
        scope: &mut CleanupScope,
    ) -> Result<PipelineOutput, PipelineError> {
        let acquisition_kind = match job.job_type {
            JobType::Download => request.media_kind,
            JobType::Transcription | JobType::Analysis => MediaKind::Audio,
        };
        self.progress(
            job.id,
            ProgressReport::new(ProgressStage::Validating, 5).with_media_kind(acquisition_kind),
        )
        .await?;

        let source = match &request.source {
            MediaSource::Text(text) => return self.analyze_text(job, text, request, cancel).await,
            MediaSource::Remote(url) => {
                SourceUrl::parse(url).map_err(PipelineError::InvalidSource)?;
                self.progress(job.id, ProgressReport::new(ProgressStage::Downloading, 10))
                    .await?;
                let acquisition = AcquisitionRequest {
                    job_id: job.id,
                    source_url: url.clone(),
                    kind: acquisition_kind,
                    quality: request.extraction.quality,
                };
                let artifact = self.downloader.acquire(&acquisition, cancel).await?;
                scope.register(&artifact.path);
                tracing::info!(
                    path = %artifact.path.display(),
                    size_bytes = artifact.size_bytes,
                    "Media acquired"
                );
                self.progress(job.id, ProgressReport::new(ProgressStage::Downloading, 40))
                    .await?;
                artifact
            }
            MediaSource::Upload(path) | MediaSource::LocalFile(path) => {
                MediaArtifact::from_path(path).await.map_err(|e| {
                    PipelineError::InvalidSource(format!("cannot read media file: {}", e))
                })?
            }
        };

        self.progress(job.id, ProgressReport::new(ProgressStage::Processing, 45))
            .await?;
        let artifact = self.prepare(job, source, request, cancel, scope).await?;
        let duration = artifact.duration_seconds.unwrap_or_default();
        self.progress(
            job.id,
            ProgressReport::new(ProgressStage::Processing, 60).with_content_seconds(Some(duration)),
        )
        .await?;

        match job.job_type {
            JobType::Transcription => {
                self.awaiting_upstream(job.id).await?;
                let options = TranscriptionOptions {
                    language: request.language.clone(),
                    prompt: request.prompt.clone(),
                };
                let text = self.invocation.transcribe(&artifact, &options, cancel).await?;
                Ok(PipelineOutput::Transcription(TranscriptionResult::new(
                    text,
                    duration,
                    request.language.clone(),
                )))
            }
            JobType::Analysis => {
                self.awaiting_upstream(job.id).await?;
                let markdown = self
                    .invocation
                    .analyze(
                        AnalysisInput::Artifact(&artifact),
                        request.prompt.as_deref(),
                        cancel,
                    )
                    .await?;
                Ok(PipelineOutput::Analysis(AnalysisResult {
                    markdown,
                    duration_seconds: Some(duration),
                }))
            }
            JobType::Download => {
                let content = tokio::fs::read(&artifact.path).await.map_err(|e| {
                    PipelineError::Acquisition(format!("reading downloaded media: {}", e))
                })?;
                Ok(PipelineOutput::Download {
                    result: DownloadResult {
                        file_name: artifact.file_name(),
                        media_kind: artifact.kind,
                        format: artifact.format.clone(),
                        size_bytes: artifact.size_bytes,
                        duration_seconds: artifact.duration_seconds,
                    },
                    content: Bytes::from(content),
                })
            }
        }
    }

    /// Turns the acquired media into the artifact handed to the final stage,
    /// reusing it as-is when it already fits the request.
    async fn prepare(
        &self,
        job: &Job,
        source: MediaArtifact,
        request: &PipelineRequest,
        cancel: &CancellationToken,
        scope: &mut CleanupScope,
    ) -> Result<MediaArtifact, PipelineError> {
        let keep_video = job.job_type == JobType::Download && request.media_kind == MediaKind::Video;
        let artifact = if keep_video || self.is_reusable(&source, &request.extraction) {
            tracing::debug!(path = %source.path.display(), "Reusing acquired media without transcoding");
            let duration = self.transcoder.probe_duration(&source.path, cancel).await?;
            source.with_duration(duration)
        } else {
            let extracted = self
                .transcoder
                .extract(job.id, &source.path, &request.extraction, cancel)
                .await?;
            scope.register(&extracted.path);
            extracted
        };

        if !keep_video && artifact.size_bytes > self.limits.max_artifact_bytes {
            return Err(PipelineError::PayloadTooLarge(format!(
                "artifact is {} bytes, limit is {}",
                artifact.size_bytes, self.limits.max_artifact_bytes
            )));
        }
        let duration = artifact.duration_seconds.unwrap_or_default();
        if duration > self.limits.max_content_seconds {
            return Err(PipelineError::PayloadTooLarge(format!(
                "content is {:.0}s long, limit is {:.0}s",
                duration, self.limits.max_content_seconds
            )));
        }
        Ok(artifact)
    }

    fn is_reusable(&self, artifact: &MediaArtifact, options: &ExtractionOptions) -> bool {
        artifact.kind == MediaKind::Audio
            && artifact.audio_format() == Some(options.format)
            && artifact.size_bytes <= self.limits.max_artifact_bytes
            && options.start_time.is_none()
            && options.end_time.is_none()
    }

    async fn analyze_text(
        &self,
        job: &Job,
        text: &str,
        request: &PipelineRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput, PipelineError> {
        if job.job_type != JobType::Analysis {
            return Err(PipelineError::InvalidSource(
                "text input is only accepted for analysis jobs".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(PipelineError::InvalidSource("text is empty".to_string()));
        }
        self.awaiting_upstream(job.id).await?;
        let markdown = self
            .invocation
            .analyze(AnalysisInput::Text(text), request.prompt.as_deref(), cancel)
            .await?;
        Ok(PipelineOutput::Analysis(AnalysisResult {
            markdown,
            duration_seconds: None,
        }))
    }

    async fn awaiting_upstream(&self, job_id: JobId) -> Result<(), PipelineError> {
        self.progress(job_id, ProgressReport::new(ProgressStage::Analyzing, 65))
            .await?;
        self.progress(job_id, ProgressReport::new(ProgressStage::AnalyzingPending, 75))
            .await
    }

    /// Records progress; a job that became terminal meanwhile was cancelled.
    async fn progress(&self, job_id: JobId, report: ProgressReport) -> Result<(), PipelineError> {
        let job = self.controller.report_progress(job_id, report).await?;
        if job.status.is_terminal() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }
}
