use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, File};
use serde::Deserialize;

use super::Environment;

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub pipeline: PipelineSettings,
    pub tools: ToolSettings,
    pub transcription: TranscriptionSettings,
    pub analysis: AnalysisSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Without a URL jobs are kept in memory.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connect_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    pub temp_dir: PathBuf,
    pub max_artifact_mb: u64,
    pub max_download_mb: u64,
    pub max_upload_mb: u64,
    pub max_content_seconds: u64,
    pub stage_timeout_seconds: u64,
}

impl PipelineSettings {
    pub fn max_artifact_bytes(&self) -> u64 {
        self.max_artifact_mb * BYTES_PER_MB
    }

    pub fn max_download_bytes(&self) -> u64 {
        self.max_download_mb * BYTES_PER_MB
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * BYTES_PER_MB
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolSettings {
    pub yt_dlp: PathBuf,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionSettings {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisSettings {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub prompt_template: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub enable_json: bool,
}

impl Settings {
    /// Loads `.env`, then layers defaults, `config/default.toml`,
    /// `config/{environment}.toml` and `APP_*` variables.
    pub fn load() -> Result<(Environment, Self), ConfigError> {
        dotenvy::dotenv().ok();
        let environment = Environment::from_env().map_err(ConfigError::Message)?;
        let settings = Self::build(environment, Path::new("config"), env_source())?;
        Ok((environment, settings))
    }

    pub fn build(
        environment: Environment,
        config_dir: &Path,
        env: config::Environment,
    ) -> Result<Self, ConfigError> {
        let default_temp = std::env::temp_dir().join("mediascribe");

        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 5)?
            .set_default("database.connect_attempts", 5)?
            .set_default("pipeline.temp_dir", default_temp.to_string_lossy().into_owned())?
            .set_default("pipeline.max_artifact_mb", 25)?
            .set_default("pipeline.max_download_mb", 500)?
            .set_default("pipeline.max_upload_mb", 500)?
            .set_default("pipeline.max_content_seconds", 7200)?
            .set_default("pipeline.stage_timeout_seconds", 900)?
            .set_default("tools.yt_dlp", "yt-dlp")?
            .set_default("tools.ffmpeg", "ffmpeg")?
            .set_default("tools.ffprobe", "ffprobe")?
            .set_default("transcription.api_key", "")?
            .set_default("analysis.api_key", "")?
            .set_default("logging.level", "info")?
            .set_default("logging.enable_json", false)?
            .add_source(File::from(config_dir.join("default")).required(false))
            .add_source(File::from(config_dir.join(environment.as_str())).required(false))
            .add_source(env)
            .build()?
            .try_deserialize()
    }
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix("APP")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
