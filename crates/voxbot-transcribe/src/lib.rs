//! Transcription backend library for voxbot.
//!
//! This crate provides a trait-based abstraction for audio transcription,
//! with adapters for Groq, Cloudflare Workers AI (Whisper and Deepgram
//! model families) and the standalone Deepgram API. Each adapter speaks a
//! materially different wire protocol; all of them normalize the provider
//! response to a single transcript string.

mod cloudflare;
mod deepgram;
mod groq;
pub mod media;
mod registry;

use std::time::Duration;

use async_trait::async_trait;
pub use bytes::Bytes;
pub use cloudflare::{CloudflareConfig, CloudflareDeepgramClient, CloudflareWhisperClient};
pub use deepgram::{DeepgramClient, DeepgramConfig};
pub use groq::{GroqClient, GroqConfig};
pub use registry::{ActiveBackend, BackendKind, build_backend};
use thiserror::Error;

use crate::media::content_type;

/// Upper bound on a single provider call. The call is abandoned and
/// reported as a timeout once this elapses.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors that can occur during transcription.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// The provider answered with a non-success status. The body is kept
    /// verbatim for diagnostics.
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("provider call exceeded the {}s limit", REQUEST_TIMEOUT.as_secs())]
    Timeout,

    #[error("network error: {0}")]
    Network(reqwest::Error),

    /// Every parse fallback yielded an empty transcript.
    #[error("empty transcript received from provider")]
    EmptyTranscript,

    /// The response did not match the provider's wire contract.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// The selected backend is not configured with the named credential.
    #[error("missing credentials: {0} is not set")]
    MissingCredentials(&'static str),

    #[error("unknown backend {0:?}")]
    UnknownBackend(String),
}

impl From<reqwest::Error> for TranscribeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err)
        }
    }
}

/// Result type for transcription operations.
pub type Result<T> = std::result::Result<T, TranscribeError>;

/// One audio object to transcribe: raw bytes plus the declared content
/// type. Ephemeral, built per job and discarded afterwards.
#[derive(Debug, Clone)]
pub struct AudioPayload {
    data: Bytes,
    content_type: String,
}

impl AudioPayload {
    /// Build a payload from raw bytes and a file name. The content type is
    /// resolved from the file name's extension.
    pub fn new(data: Bytes, file_name: &str) -> Self {
        Self {
            content_type: content_type(file_name).to_string(),
            data,
        }
    }

    /// Build a payload with an explicit content type.
    pub fn with_content_type(data: Bytes, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Trait for transcription backends.
///
/// Implement this trait to add new providers. One invocation performs
/// exactly one outbound network call, bounded by [`REQUEST_TIMEOUT`]; on
/// success the returned text is non-empty.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe audio to text.
    ///
    /// # Arguments
    /// * `audio` - Audio payload (bytes + content type). Cloning the inner
    ///             `Bytes` is O(1).
    /// * `language` - Optional language hint (ISO 639-1 code, e.g. "pt").
    ///                Providers may ignore it; `None` means auto-detect.
    async fn transcribe(&self, audio: &AudioPayload, language: Option<&str>) -> Result<String>;

    /// Returns the name of this transcriber for logging/debugging.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_resolves_content_type_from_file_name() {
        let payload = AudioPayload::new(Bytes::from_static(b"abc"), "voice.opus");
        assert_eq!(payload.content_type(), "audio/opus");
        assert_eq!(payload.len(), 3);
    }

    #[test]
    fn payload_with_explicit_content_type() {
        let payload = AudioPayload::with_content_type(Bytes::new(), "audio/ogg");
        assert_eq!(payload.content_type(), "audio/ogg");
        assert!(payload.is_empty());
    }

    #[test]
    fn timeout_errors_are_classified() {
        // reqwest errors are hard to fabricate; the classification itself
        // is a one-liner, so just pin the display format here.
        let err = TranscribeError::Timeout;
        assert!(err.to_string().contains("60s"));
    }
}
