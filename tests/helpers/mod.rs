#![allow(dead_code)]

pub mod test_postgres;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mediascribe::application::ports::{
    AcquisitionError, AcquisitionRequest, AnalysisClient, AnalysisError, AudioTranscoder,
    Completion, ExtractionOptions, JobRepository, MediaDownloader, MediaPayload, TranscodeError,
    TranscriptionEngine, TranscriptionError, TranscriptionOptions,
};
use mediascribe::application::services::{
    DEFAULT_PROMPT_TEMPLATE, InvocationAdapter, JobStatusController, MediaPipeline,
    PipelineLimits, ProgressBoard,
};
use mediascribe::domain::{JobId, MediaArtifact};
use mediascribe::infrastructure::notifications::BroadcastNotifier;
use mediascribe::infrastructure::persistence::InMemoryJobRepository;
use mediascribe::presentation::AppState;
use mediascribe::presentation::config::PipelineSettings;

pub const MB: u64 = 1024 * 1024;

/// Writes `size` bytes to `dir/name` and returns the path.
pub fn write_file(dir: &Path, name: &str, size: u64) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, vec![0u8; size as usize]).unwrap();
    path
}

/// Writes an executable shell script standing in for an external tool.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    path
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub enum DownloadBehavior {
    /// Writes a file of the given name suffix and size, after an optional delay.
    Produce {
        suffix: &'static str,
        size: u64,
        delay: Duration,
    },
    Fail,
    /// Blocks until cancelled.
    Hang,
}

pub struct FakeDownloader {
    pub temp_dir: PathBuf,
    pub behavior: DownloadBehavior,
    pub calls: AtomicUsize,
    pub started: tokio::sync::Notify,
}

impl FakeDownloader {
    pub fn new(temp_dir: &Path, behavior: DownloadBehavior) -> Self {
        Self {
            temp_dir: temp_dir.to_path_buf(),
            behavior,
            calls: AtomicUsize::new(0),
            started: tokio::sync::Notify::new(),
        }
    }
}

#[async_trait]
impl MediaDownloader for FakeDownloader {
    async fn acquire(
        &self,
        request: &AcquisitionRequest,
        cancel: &CancellationToken,
    ) -> Result<MediaArtifact, AcquisitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        match &self.behavior {
            DownloadBehavior::Produce {
                suffix,
                size,
                delay,
            } => {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(AcquisitionError::Cancelled),
                    _ = tokio::time::sleep(*delay) => {}
                }
                let path = write_file(
                    &self.temp_dir,
                    &format!("{}-{}", request.job_id, suffix),
                    *size,
                );
                Ok(MediaArtifact::from_path(&path).await?)
            }
            DownloadBehavior::Fail => Err(AcquisitionError::DownloaderFailed {
                code: Some(1),
                diagnostics: "ERROR: Video unavailable".to_string(),
            }),
            DownloadBehavior::Hang => {
                cancel.cancelled().await;
                Err(AcquisitionError::Cancelled)
            }
        }
    }
}

/// Transcoder double: extraction writes `{job}-audio.{ext}` of a fixed size,
/// probing reports a fixed duration.
pub struct FakeTranscoder {
    pub temp_dir: PathBuf,
    pub output_size: u64,
    pub duration_seconds: f64,
    pub extract_calls: AtomicUsize,
    pub probe_calls: AtomicUsize,
}

impl FakeTranscoder {
    pub fn new(temp_dir: &Path, output_size: u64, duration_seconds: f64) -> Self {
        Self {
            temp_dir: temp_dir.to_path_buf(),
            output_size,
            duration_seconds,
            extract_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AudioTranscoder for FakeTranscoder {
    async fn extract(
        &self,
        job_id: JobId,
        _source: &Path,
        options: &ExtractionOptions,
        _cancel: &CancellationToken,
    ) -> Result<MediaArtifact, TranscodeError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        options.clip()?;
        let path = write_file(
            &self.temp_dir,
            &format!("{}-audio.{}", job_id, options.format.extension()),
            self.output_size,
        );
        Ok(MediaArtifact::from_path(&path)
            .await?
            .with_duration(self.duration_seconds))
    }

    async fn probe_duration(
        &self,
        _path: &Path,
        _cancel: &CancellationToken,
    ) -> Result<f64, TranscodeError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.duration_seconds)
    }
}

pub struct FakeTranscriptionEngine {
    pub transcript: String,
    pub calls: AtomicUsize,
    pub last_options: Mutex<Option<TranscriptionOptions>>,
}

impl FakeTranscriptionEngine {
    pub fn returning(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
            calls: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TranscriptionEngine for FakeTranscriptionEngine {
    async fn transcribe(
        &self,
        _artifact: &MediaArtifact,
        options: &TranscriptionOptions,
    ) -> Result<String, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());
        Ok(self.transcript.clone())
    }
}

pub struct FakeAnalysisClient {
    pub completion: Completion,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    pub media_types: Mutex<Vec<Option<String>>>,
}

impl FakeAnalysisClient {
    pub fn returning(markdown: &str) -> Self {
        Self::with_completion(Completion {
            text: Some(markdown.to_string()),
            block_reason: None,
        })
    }

    pub fn with_completion(completion: Completion) -> Self {
        Self {
            completion,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            media_types: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AnalysisClient for FakeAnalysisClient {
    async fn generate(
        &self,
        prompt: &str,
        media: Option<MediaPayload>,
    ) -> Result<Completion, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.media_types
            .lock()
            .unwrap()
            .push(media.map(|m| m.mime_type));
        Ok(self.completion.clone())
    }
}

/// Everything a pipeline test needs to inspect afterwards.
pub struct Harness {
    pub temp_dir: tempfile::TempDir,
    pub controller: Arc<JobStatusController>,
    pub pipeline: Arc<MediaPipeline>,
    pub progress_board: Arc<ProgressBoard>,
    pub events: Arc<BroadcastNotifier>,
    pub downloader: Arc<FakeDownloader>,
    pub transcoder: Arc<FakeTranscoder>,
    pub engine: Arc<FakeTranscriptionEngine>,
    pub analysis: Arc<FakeAnalysisClient>,
}

pub struct HarnessBuilder {
    download: DownloadBehavior,
    extracted_size: u64,
    duration_seconds: f64,
    transcript: String,
    completion: Completion,
    limits: PipelineLimits,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            download: DownloadBehavior::Produce {
                suffix: "abc12345678.m4a",
                size: MB,
                delay: Duration::ZERO,
            },
            extracted_size: MB,
            duration_seconds: 120.0,
            transcript: "hello world".to_string(),
            completion: Completion {
                text: Some("# Report".to_string()),
                block_reason: None,
            },
            limits: PipelineLimits {
                max_artifact_bytes: 25 * MB,
                max_content_seconds: 7200.0,
            },
        }
    }
}

impl HarnessBuilder {
    pub fn download(mut self, behavior: DownloadBehavior) -> Self {
        self.download = behavior;
        self
    }

    pub fn extracted_size(mut self, size: u64) -> Self {
        self.extracted_size = size;
        self
    }

    pub fn duration_seconds(mut self, seconds: f64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn transcript(mut self, text: &str) -> Self {
        self.transcript = text.to_string();
        self
    }

    pub fn completion(mut self, completion: Completion) -> Self {
        self.completion = completion;
        self
    }

    pub fn build(self) -> Harness {
        let temp_dir = tempfile::tempdir().unwrap();
        let repository: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
        let progress_board = Arc::new(ProgressBoard::new());
        let events = Arc::new(BroadcastNotifier::default());
        let controller = Arc::new(
            JobStatusController::new(repository)
                .with_notifier(progress_board.clone())
                .with_notifier(events.clone()),
        );

        let downloader = Arc::new(FakeDownloader::new(temp_dir.path(), self.download));
        let transcoder = Arc::new(FakeTranscoder::new(
            temp_dir.path(),
            self.extracted_size,
            self.duration_seconds,
        ));
        let engine = Arc::new(FakeTranscriptionEngine::returning(&self.transcript));
        let analysis = Arc::new(FakeAnalysisClient::with_completion(self.completion));
        let invocation = Arc::new(InvocationAdapter::new(
            engine.clone(),
            analysis.clone(),
            DEFAULT_PROMPT_TEMPLATE.to_string(),
            Duration::from_secs(5),
        ));
        let pipeline = Arc::new(MediaPipeline::new(
            controller.clone(),
            downloader.clone(),
            transcoder.clone(),
            invocation,
            self.limits,
        ));

        Harness {
            temp_dir,
            controller,
            pipeline,
            progress_board,
            events,
            downloader,
            transcoder,
            engine,
            analysis,
        }
    }
}

impl Harness {
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            temp_dir: self.temp_dir.path().to_path_buf(),
            max_artifact_mb: 25,
            max_download_mb: 500,
            max_upload_mb: 1,
            max_content_seconds: 7200,
            stage_timeout_seconds: 5,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            controller: self.controller.clone(),
            pipeline: self.pipeline.clone(),
            progress_board: self.progress_board.clone(),
            events: self.events.clone(),
            pipeline_settings: Arc::new(self.pipeline_settings()),
        }
    }
}
