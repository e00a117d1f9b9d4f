pub mod analysis;
pub mod media;
pub mod notifications;
pub mod observability;
pub mod persistence;
pub mod transcription;
