use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::application::ports::{AcquisitionError, AcquisitionRequest, MediaDownloader};
use crate::domain::{JobId, MediaArtifact, MediaKind, SourceUrl};
use crate::infrastructure::observability::summarize_diagnostics;

use super::{CommandError, CommandRunner};

const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp"];

#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    pub binary: PathBuf,
    pub temp_dir: PathBuf,
    pub max_download_bytes: u64,
    pub max_content_seconds: u64,
    pub timeout: Duration,
}

/// Acquires remote media through the yt-dlp CLI. Every file the tool writes
/// for a job starts with `<job id>-` so partial output can be found and removed.
pub struct YtDlpDownloader {
    runner: CommandRunner,
    config: YtDlpConfig,
}

impl YtDlpDownloader {
    pub fn new(config: YtDlpConfig) -> Self {
        Self {
            runner: CommandRunner::new(&config.binary, config.timeout),
            config,
        }
    }

    fn output_prefix(job_id: JobId) -> String {
        format!("{}-", job_id)
    }

    /// Argument vector for one acquisition. The URL always comes last, after `--`.
    pub fn build_args(&self, request: &AcquisitionRequest, source: &SourceUrl) -> Vec<OsString> {
        let max_mb = (self.config.max_download_bytes / (1024 * 1024)).max(1);
        let format = match request.kind {
            MediaKind::Audio => format!(
                "bestaudio[ext=m4a][filesize<{max}M]/bestaudio[filesize<{max}M]/bestaudio[filesize_approx<{max}M]/bestaudio",
                max = max_mb
            ),
            MediaKind::Video => format!(
                "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}][filesize<{max}M]/best[height<={h}]",
                h = request.quality.max_video_height(),
                max = max_mb
            ),
        };
        let template = self
            .config
            .temp_dir
            .join(format!("{}%(id)s.%(ext)s", Self::output_prefix(request.job_id)));

        let mut args: Vec<OsString> = vec![
            "--no-playlist".into(),
            "--no-progress".into(),
            "--no-part".into(),
            "--restrict-filenames".into(),
            "-f".into(),
            format.into(),
            "--max-filesize".into(),
            format!("{}M", max_mb).into(),
            "--match-filter".into(),
            format!("duration <= {}", self.config.max_content_seconds).into(),
        ];
        if request.kind == MediaKind::Video {
            args.push("--merge-output-format".into());
            args.push("mp4".into());
        }
        args.extend(Vec::<OsString>::from([
            "-o".into(),
            template.into_os_string(),
            "--no-simulate".into(),
            "--print".into(),
            "after_move:filepath".into(),
            "--".into(),
            source.canonical().into(),
        ]));
        args
    }

    /// The path the tool reported, if it exists; otherwise the newest finished
    /// file carrying the job prefix. Remuxing can change the extension.
    async fn locate_output(&self, job_id: JobId, stdout: &str) -> Option<PathBuf> {
        let prefix = Self::output_prefix(job_id);
        let reported = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(PathBuf::from);
        if let Some(path) = reported {
            let owned = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with(&prefix));
            if owned && tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                return Some(path);
            }
        }

        let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
        for path in self.job_files(job_id).await {
            if is_partial(&path) {
                continue;
            }
            let Ok(meta) = tokio::fs::metadata(&path).await else {
                continue;
            };
            let modified = meta.modified().unwrap_or(std::time::UNIX_EPOCH);
            if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
                newest = Some((modified, path));
            }
        }
        newest.map(|(_, path)| path)
    }

    async fn job_files(&self, job_id: JobId) -> Vec<PathBuf> {
        let prefix = Self::output_prefix(job_id);
        let mut files = Vec::new();
        let Ok(mut entries) = tokio::fs::read_dir(&self.config.temp_dir).await else {
            return files;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                files.push(entry.path());
            }
        }
        files
    }

    async fn remove_partial_output(&self, job_id: JobId) {
        for path in self.job_files(job_id).await {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed partial download"),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial download")
                }
            }
        }
    }
}

#[async_trait]
impl MediaDownloader for YtDlpDownloader {
    #[instrument(skip_all, fields(job_id = %request.job_id, kind = %request.kind))]
    async fn acquire(
        &self,
        request: &AcquisitionRequest,
        cancel: &CancellationToken,
    ) -> Result<MediaArtifact, AcquisitionError> {
        let source = SourceUrl::parse(&request.source_url).map_err(AcquisitionError::InvalidSource)?;
        tokio::fs::create_dir_all(&self.config.temp_dir).await?;

        let args = self.build_args(request, &source);
        tracing::info!(video_id = %source.video_id(), "Starting download");

        let output = match self.runner.run(&args, cancel).await {
            Ok(output) => output,
            Err(e) => {
                self.remove_partial_output(request.job_id).await;
                return Err(match e {
                    CommandError::TimedOut(after) => AcquisitionError::Timeout(after),
                    CommandError::Cancelled => AcquisitionError::Cancelled,
                    CommandError::Spawn { source, .. } => AcquisitionError::Io(source),
                    CommandError::Io(io) => AcquisitionError::Io(io),
                });
            }
        };

        if !output.success() {
            self.remove_partial_output(request.job_id).await;
            return Err(AcquisitionError::DownloaderFailed {
                code: output.code,
                diagnostics: summarize_diagnostics(&output.stderr),
            });
        }

        let Some(path) = self.locate_output(request.job_id, &output.stdout).await else {
            self.remove_partial_output(request.job_id).await;
            tracing::warn!(
                diagnostics = %summarize_diagnostics(&output.stderr),
                "Downloader exited cleanly without output"
            );
            return Err(AcquisitionError::MissingOutput);
        };

        let artifact = MediaArtifact::from_path(&path).await?;
        if artifact.size_bytes > self.config.max_download_bytes {
            self.remove_partial_output(request.job_id).await;
            return Err(AcquisitionError::TooLarge {
                size_bytes: artifact.size_bytes,
                limit_bytes: self.config.max_download_bytes,
            });
        }

        tracing::info!(
            path = %artifact.path.display(),
            size_bytes = artifact.size_bytes,
            format = %artifact.format,
            "Download finished"
        );
        Ok(artifact)
    }
}

fn is_partial(path: &Path) -> bool {
    let name = path.to_string_lossy();
    PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s))
}
