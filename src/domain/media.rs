use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "wav", "aac", "ogg", "oga", "opus", "flac", "weba"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    pub fn from_extension(extension: &str) -> Self {
        if AUDIO_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str()) {
            MediaKind::Audio
        } else {
            MediaKind::Video
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            _ => Err(format!("Invalid media kind: {}", s)),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
    #[default]
    M4a,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::M4a => "m4a",
        }
    }

    pub fn codec(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "libmp3lame",
            AudioFormat::Wav => "pcm_s16le",
            AudioFormat::M4a => "aac",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::M4a => "audio/mp4",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        extension.parse().ok()
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            "m4a" | "aac" | "mp4a" => Ok(AudioFormat::M4a),
            _ => Err(format!("Unsupported audio format: {}", s)),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl AudioQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioQuality::Low => "low",
            AudioQuality::Medium => "medium",
            AudioQuality::High => "high",
        }
    }

    /// Height cap used when selecting a video rendition for this quality.
    pub fn max_video_height(&self) -> u32 {
        match self {
            AudioQuality::Low => 480,
            AudioQuality::Medium => 720,
            AudioQuality::High => 1080,
        }
    }
}

impl FromStr for AudioQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(AudioQuality::Low),
            "medium" => Ok(AudioQuality::Medium),
            "high" => Ok(AudioQuality::High),
            _ => Err(format!("Invalid quality: {}", s)),
        }
    }
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Concrete encoder settings behind a format/quality pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPreset {
    /// `None` for PCM, whose bitrate follows from rate and channels.
    pub bitrate_kbps: Option<u32>,
    pub sample_rate_hz: u32,
    pub channels: u8,
}

impl QualityPreset {
    /// | format | low              | medium            | high              |
    /// |--------|------------------|-------------------|-------------------|
    /// | mp3    | 64k, 22.05k, 1ch | 128k, 44.1k, 2ch  | 192k, 44.1k, 2ch  |
    /// | m4a    | 64k, 22.05k, 1ch | 128k, 44.1k, 2ch  | 256k, 48k, 2ch    |
    /// | wav    | pcm, 16k, 1ch    | pcm, 22.05k, 1ch  | pcm, 44.1k, 2ch   |
    pub fn for_output(format: AudioFormat, quality: AudioQuality) -> Self {
        let (bitrate_kbps, sample_rate_hz, channels) = match (format, quality) {
            (AudioFormat::Mp3, AudioQuality::Low) => (Some(64), 22_050, 1),
            (AudioFormat::Mp3, AudioQuality::Medium) => (Some(128), 44_100, 2),
            (AudioFormat::Mp3, AudioQuality::High) => (Some(192), 44_100, 2),
            (AudioFormat::M4a, AudioQuality::Low) => (Some(64), 22_050, 1),
            (AudioFormat::M4a, AudioQuality::Medium) => (Some(128), 44_100, 2),
            (AudioFormat::M4a, AudioQuality::High) => (Some(256), 48_000, 2),
            (AudioFormat::Wav, AudioQuality::Low) => (None, 16_000, 1),
            (AudioFormat::Wav, AudioQuality::Medium) => (None, 22_050, 1),
            (AudioFormat::Wav, AudioQuality::High) => (None, 44_100, 2),
        };
        Self {
            bitrate_kbps,
            sample_rate_hz,
            channels,
        }
    }
}

/// A transient media file produced by one pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_seconds: Option<f64>,
    pub format: String,
    pub kind: MediaKind,
}

impl MediaArtifact {
    pub fn new(path: PathBuf, size_bytes: u64) -> Self {
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_ascii_lowercase();
        let kind = MediaKind::from_extension(&format);
        Self {
            path,
            size_bytes,
            duration_seconds: None,
            format,
            kind,
        }
    }

    /// Builds an artifact from a file on disk, reading its size.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        Ok(Self::new(path.to_path_buf(), meta.len()))
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn audio_format(&self) -> Option<AudioFormat> {
        AudioFormat::from_extension(&self.format)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("media.{}", self.format))
    }

    pub fn mime_type(&self) -> &'static str {
        mime_for_format(&self.format)
    }
}

/// Content type for a container extension, falling back to MP4.
pub fn mime_for_format(format: &str) -> &'static str {
    match AudioFormat::from_extension(format) {
        Some(audio) => audio.mime_type(),
        None => match format.to_ascii_lowercase().as_str() {
            "webm" | "weba" => "video/webm",
            "mkv" => "video/x-matroska",
            "ogg" | "oga" | "opus" => "audio/ogg",
            "flac" => "audio/flac",
            _ => "video/mp4",
        },
    }
}
