//! Backend registry and process-wide active-backend selection.
//!
//! New providers register by adding a [`BackendKind`] variant and a
//! factory arm; dispatch code never switches on provider names directly.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;
use voxbot_core::Config;

use crate::{
    CloudflareConfig, CloudflareDeepgramClient, CloudflareWhisperClient, DeepgramClient,
    DeepgramConfig, GroqClient, GroqConfig, Result, TranscribeError, Transcriber,
};

/// The set of configured adapter identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Groq,
    CloudflareWhisper,
    CloudflareDeepgram,
    Deepgram,
}

impl BackendKind {
    /// All known backends, in the order tried when no explicit selection
    /// is configured.
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Groq,
        BackendKind::CloudflareWhisper,
        BackendKind::CloudflareDeepgram,
        BackendKind::Deepgram,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Groq => "groq",
            BackendKind::CloudflareWhisper => "cloudflare-whisper",
            BackendKind::CloudflareDeepgram => "cloudflare-deepgram",
            BackendKind::Deepgram => "deepgram",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = TranscribeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "groq" => Ok(BackendKind::Groq),
            "cloudflare-whisper" => Ok(BackendKind::CloudflareWhisper),
            "cloudflare-deepgram" => Ok(BackendKind::CloudflareDeepgram),
            "deepgram" => Ok(BackendKind::Deepgram),
            other => Err(TranscribeError::UnknownBackend(other.to_string())),
        }
    }
}

/// Build a backend from the configuration, validating that the
/// credentials it needs are present.
pub fn build_backend(kind: BackendKind, config: &Config) -> Result<Arc<dyn Transcriber>> {
    match kind {
        BackendKind::Groq => {
            let api_key = config
                .groq_api_key
                .clone()
                .ok_or(TranscribeError::MissingCredentials("groq_api_key"))?;
            let mut groq = GroqConfig::new(api_key);
            if let Some(model) = &config.groq_model {
                groq = groq.with_model(model);
            }
            Ok(Arc::new(GroqClient::new(groq)))
        }
        BackendKind::CloudflareWhisper | BackendKind::CloudflareDeepgram => {
            let account_id = config
                .cloudflare_account_id
                .clone()
                .ok_or(TranscribeError::MissingCredentials("cloudflare_account_id"))?;
            let api_key = config
                .cloudflare_api_key
                .clone()
                .ok_or(TranscribeError::MissingCredentials("cloudflare_api_key"))?;
            let mut cf = CloudflareConfig::new(account_id, api_key);
            if kind == BackendKind::CloudflareWhisper {
                if let Some(model) = &config.cloudflare_whisper_model {
                    cf = cf.with_model(model);
                }
                Ok(Arc::new(CloudflareWhisperClient::new(cf)))
            } else {
                if let Some(model) = &config.cloudflare_deepgram_model {
                    cf = cf.with_model(model);
                }
                Ok(Arc::new(CloudflareDeepgramClient::new(cf)))
            }
        }
        BackendKind::Deepgram => {
            let api_key = config
                .deepgram_api_key
                .clone()
                .ok_or(TranscribeError::MissingCredentials("deepgram_api_key"))?;
            let mut dg = DeepgramConfig::new(api_key);
            if let Some(model) = &config.deepgram_model {
                dg = dg.with_model(model);
            }
            Ok(Arc::new(DeepgramClient::new(dg)))
        }
    }
}

/// The single provider currently selected to serve new jobs.
///
/// Readers take a cheap `Arc` clone once at job start, so a concurrent
/// switch takes effect for the next job only and never retroactively.
pub struct ActiveBackend {
    inner: RwLock<Arc<dyn Transcriber>>,
}

impl ActiveBackend {
    pub fn new(backend: Arc<dyn Transcriber>) -> Self {
        Self {
            inner: RwLock::new(backend),
        }
    }

    /// The backend serving new jobs right now.
    pub fn current(&self) -> Arc<dyn Transcriber> {
        self.inner.read().clone()
    }

    /// Replace the active backend wholesale. In-flight jobs keep the one
    /// they resolved at start.
    pub fn swap(&self, backend: Arc<dyn Transcriber>) {
        let name = backend.name();
        *self.inner.write() = backend;
        info!(backend = name, "active transcription backend switched");
    }
}
