mod environment;
mod settings;

pub use environment::Environment;
pub use settings::{
    AnalysisSettings, DatabaseSettings, LoggingSettings, PipelineSettings, ServerSettings,
    Settings, ToolSettings, TranscriptionSettings,
};
