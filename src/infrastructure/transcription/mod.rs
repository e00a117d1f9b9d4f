mod openai_whisper_engine;

pub use openai_whisper_engine::{
    DEFAULT_WHISPER_BASE_URL, DEFAULT_WHISPER_MODEL, OpenAiWhisperEngine,
};
