//! voxbot — chat voice-note transcription bot.
//!
//! Receives inbound message events from a chat transport, detects audio
//! content and replies with a text transcription produced by one of
//! several interchangeable speech-to-text backends.

// Re-export from sub-crates
pub use voxbot_core::{APP_NAME, Config, ConfigManager, DEFAULT_LOG_LEVEL, ExclusionList};
pub use voxbot_transcribe::{
    ActiveBackend, AudioPayload, BackendKind, TranscribeError, Transcriber, build_backend,
};

// App-specific modules
pub mod bot;
pub mod command;
pub mod gateway;
pub mod job;

// Version from this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
