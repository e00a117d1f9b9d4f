mod command_runner;
mod ffmpeg_transcoder;
mod yt_dlp_downloader;

pub use command_runner::{CommandError, CommandOutput, CommandRunner};
pub use ffmpeg_transcoder::{FfmpegConfig, FfmpegTranscoder, parse_probe_duration};
pub use yt_dlp_downloader::{YtDlpConfig, YtDlpDownloader};
