use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::application::ports::{AudioTranscoder, ExtractionOptions, TranscodeError};
use crate::domain::{JobId, MediaArtifact, QualityPreset};
use crate::infrastructure::observability::summarize_diagnostics;

use super::{CommandError, CommandRunner};

#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub temp_dir: PathBuf,
    pub max_artifact_bytes: u64,
    pub timeout: Duration,
}

/// ffprobe JSON output structure.
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    duration: Option<String>,
}

/// Extracts audio with ffmpeg and reads durations with ffprobe.
pub struct FfmpegTranscoder {
    ffmpeg: CommandRunner,
    ffprobe: CommandRunner,
    temp_dir: PathBuf,
    max_artifact_bytes: u64,
}

impl FfmpegTranscoder {
    pub fn new(config: FfmpegConfig) -> Self {
        Self {
            ffmpeg: CommandRunner::new(config.ffmpeg, config.timeout),
            ffprobe: CommandRunner::new(config.ffprobe, config.timeout),
            temp_dir: config.temp_dir,
            max_artifact_bytes: config.max_artifact_bytes,
        }
    }

    pub fn output_path(&self, job_id: JobId, options: &ExtractionOptions) -> PathBuf {
        self.temp_dir
            .join(format!("{}-audio.{}", job_id, options.format.extension()))
    }

    pub fn build_args(
        source: &Path,
        output: &Path,
        options: &ExtractionOptions,
    ) -> Result<Vec<OsString>, TranscodeError> {
        let (seek, length) = options.clip()?;
        let preset = QualityPreset::for_output(options.format, options.quality);

        let mut args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
        ];
        if let Some(seek) = seek {
            args.push("-ss".into());
            args.push(format!("{:.3}", seek).into());
        }
        args.push("-i".into());
        args.push(source.as_os_str().to_owned());
        if let Some(length) = length {
            args.push("-t".into());
            args.push(format!("{:.3}", length).into());
        }
        args.extend(Vec::<OsString>::from([
            "-vn".into(),
            "-map".into(),
            "0:a:0".into(),
            "-c:a".into(),
            options.format.codec().into(),
            "-ar".into(),
            preset.sample_rate_hz.to_string().into(),
            "-ac".into(),
            preset.channels.to_string().into(),
        ]));
        if let Some(kbps) = preset.bitrate_kbps {
            args.push("-b:a".into());
            args.push(format!("{}k", kbps).into());
        }
        args.push(output.as_os_str().to_owned());
        Ok(args)
    }

    async fn discard(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed transcoder output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove transcoder output")
            }
        }
    }
}

#[async_trait]
impl AudioTranscoder for FfmpegTranscoder {
    #[instrument(skip_all, fields(job_id = %job_id, format = %options.format, quality = %options.quality))]
    async fn extract(
        &self,
        job_id: JobId,
        source: &Path,
        options: &ExtractionOptions,
        cancel: &CancellationToken,
    ) -> Result<MediaArtifact, TranscodeError> {
        let output = self.output_path(job_id, options);
        let args = Self::build_args(source, &output, options)?;
        tokio::fs::create_dir_all(&self.temp_dir).await?;

        let result = match self.ffmpeg.run(&args, cancel).await {
            Ok(result) => result,
            Err(e) => {
                self.discard(&output).await;
                return Err(command_error(e));
            }
        };
        if !result.success() {
            self.discard(&output).await;
            return Err(TranscodeError::TranscoderFailed {
                code: result.code,
                diagnostics: summarize_diagnostics(&result.stderr),
            });
        }

        let artifact = match MediaArtifact::from_path(&output).await {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!(error = %e, "Transcoder exited cleanly without output");
                self.discard(&output).await;
                return Err(TranscodeError::MissingOutput);
            }
        };
        if artifact.size_bytes > self.max_artifact_bytes {
            self.discard(&output).await;
            return Err(TranscodeError::PayloadTooLarge {
                size_bytes: artifact.size_bytes,
                limit_bytes: self.max_artifact_bytes,
            });
        }

        let duration = match self.probe_duration(&output, cancel).await {
            Ok(duration) => duration,
            Err(e) => {
                self.discard(&output).await;
                return Err(e);
            }
        };

        tracing::info!(
            path = %artifact.path.display(),
            size_bytes = artifact.size_bytes,
            duration_seconds = duration,
            "Audio extracted"
        );
        Ok(artifact.with_duration(duration))
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    async fn probe_duration(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<f64, TranscodeError> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-print_format".into(),
            "json".into(),
            "-show_format".into(),
            "-show_streams".into(),
            path.as_os_str().to_owned(),
        ];
        let result = self.ffprobe.run(&args, cancel).await.map_err(command_error)?;
        if !result.success() {
            return Err(TranscodeError::ProbeFailed(summarize_diagnostics(
                &result.stderr,
            )));
        }
        parse_probe_duration(&result.stdout)
    }
}

/// Container duration, or the longest audio stream when the container omits it.
pub fn parse_probe_duration(json: &str) -> Result<f64, TranscodeError> {
    let probe: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| TranscodeError::ProbeFailed(format!("unreadable probe output: {}", e)))?;

    let from_format = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok());
    let from_streams = probe
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("audio"))
        .filter_map(|s| s.duration.as_deref()?.parse::<f64>().ok())
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))));

    match from_format.or(from_streams) {
        Some(d) if d.is_finite() && d > 0.0 => Ok(d),
        Some(d) => Err(TranscodeError::ProbeFailed(format!("invalid duration {}", d))),
        None => Err(TranscodeError::ProbeFailed("no duration reported".to_string())),
    }
}

fn command_error(e: CommandError) -> TranscodeError {
    match e {
        CommandError::TimedOut(after) => TranscodeError::Timeout(after),
        CommandError::Cancelled => TranscodeError::Cancelled,
        CommandError::Spawn { source, .. } => TranscodeError::Io(source),
        CommandError::Io(io) => TranscodeError::Io(io),
    }
}
