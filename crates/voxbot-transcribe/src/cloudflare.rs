//! Cloudflare Workers AI transcription backends.
//!
//! The same `/ai/run/{model}` endpoint serves two model families with
//! different wire contracts. Whisper models take base64 audio in a flat
//! JSON object and answer with a Whisper-shaped document; Deepgram models
//! take a nested `audio` payload and answer with a Deepgram-shaped one.
//! Depending on the API version the answer may or may not be wrapped in a
//! `result` envelope, so both parsers degrade through an ordered list of
//! increasingly permissive shapes before declaring failure.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AudioPayload, REQUEST_TIMEOUT, Result, TranscribeError, Transcriber};

const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com";
const DEFAULT_WHISPER_MODEL: &str = "@cf/openai/whisper-large-v3-turbo";
const DEFAULT_DEEPGRAM_MODEL: &str = "@cf/deepgram/nova-3";

/// Configuration shared by both Cloudflare Workers AI clients.
#[derive(Debug, Clone)]
pub struct CloudflareConfig {
    /// Cloudflare account identifier
    pub account_id: String,

    /// Cloudflare API token
    pub api_key: String,

    /// Model to run (each client has its own default)
    pub model: Option<String>,

    /// Base URL override, used by tests against a local mock server.
    pub base_url: Option<String>,
}

impl CloudflareConfig {
    /// Create a new Cloudflare config with the given credentials.
    pub fn new(account_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            api_key: api_key.into(),
            model: None,
            base_url: None,
        }
    }

    /// Set the model to run.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn run_url(&self, default_model: &str) -> String {
        let base = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!(
            "{}/client/v4/accounts/{}/ai/run/{}",
            base.trim_end_matches('/'),
            self.account_id,
            self.model.as_deref().unwrap_or(default_model),
        )
    }
}

/// Some Workers AI responses wrap the model output in a `result` field.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

/// Parse a body that may or may not carry the `result` envelope.
fn enveloped<T: DeserializeOwned>(body: &str) -> Option<T> {
    if let Ok(Envelope { result }) = serde_json::from_str::<Envelope<T>>(body) {
        return Some(result);
    }
    serde_json::from_str::<T>(body).ok()
}

/// Final cascade tier: a body that is not JSON at all is taken verbatim
/// as the transcript. A body that *is* JSON but yielded no text in any
/// earlier tier is an empty result, not a transcript.
fn raw_body_fallback(body: &str) -> Result<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() || serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Err(TranscribeError::EmptyTranscript);
    }
    Ok(trimmed.to_string())
}

async fn post_json(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &impl Serialize,
) -> Result<String> {
    let response = client
        .post(url)
        .timeout(REQUEST_TIMEOUT)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(TranscribeError::Api { status, body });
    }

    Ok(response.text().await?)
}

// ---------------------------------------------------------------------------
// Whisper family
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WhisperRequest<'a> {
    /// Base64-encoded audio bytes
    audio: String,
    task: &'static str,
    vad_filter: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

/// Rich Whisper output: transcript plus timing and language metadata.
/// Everything beyond `text` is informational and only logged.
#[derive(Debug, Default, Deserialize)]
struct WhisperRich {
    #[serde(default)]
    text: String,
    #[serde(default)]
    word_count: u64,
    #[serde(default)]
    transcription_info: WhisperInfo,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    #[serde(default)]
    vtt: String,
}

#[derive(Debug, Default, Deserialize)]
struct WhisperInfo {
    #[serde(default)]
    language: String,
    #[serde(default)]
    language_probability: f64,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    duration_after_vad: f64,
}

#[derive(Debug, Default, Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct WhisperMinimal {
    #[serde(default)]
    text: String,
}

/// Three-tier fallback: rich schema, minimal `text`-only schema, raw body.
fn parse_whisper_response(body: &str) -> Result<String> {
    if let Some(rich) = enveloped::<WhisperRich>(body) {
        if !rich.text.is_empty() {
            debug!(
                word_count = rich.word_count,
                detected_language = %rich.transcription_info.language,
                language_probability = rich.transcription_info.language_probability,
                duration = rich.transcription_info.duration,
                duration_after_vad = rich.transcription_info.duration_after_vad,
                segments = rich.segments.len(),
                first_segment = rich.segments.first().map(|s| s.text.as_str()).unwrap_or(""),
                has_vtt = !rich.vtt.is_empty(),
                "Whisper response parsed (rich schema)"
            );
            return Ok(rich.text);
        }
    }

    if let Some(minimal) = enveloped::<WhisperMinimal>(body) {
        if !minimal.text.is_empty() {
            debug!("Whisper response parsed (minimal schema)");
            return Ok(minimal.text);
        }
    }

    raw_body_fallback(body)
}

/// Cloudflare Workers AI client for Whisper-family models.
#[derive(Debug, Clone)]
pub struct CloudflareWhisperClient {
    client: reqwest::Client,
    config: CloudflareConfig,
}

impl CloudflareWhisperClient {
    /// Create a new client with the given configuration.
    pub fn new(config: CloudflareConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Transcriber for CloudflareWhisperClient {
    async fn transcribe(&self, audio: &AudioPayload, language: Option<&str>) -> Result<String> {
        let url = self.config.run_url(DEFAULT_WHISPER_MODEL);
        let request = WhisperRequest {
            audio: BASE64.encode(audio.data()),
            task: "transcribe",
            vad_filter: false,
            language,
        };

        debug!(
            url = %url,
            audio_bytes = audio.len(),
            base64_bytes = request.audio.len(),
            language = ?language,
            "Sending transcription request to Cloudflare Whisper"
        );

        let body = post_json(&self.client, &url, &self.config.api_key, &request).await?;
        parse_whisper_response(&body)
    }

    fn name(&self) -> &'static str {
        "cloudflare-whisper"
    }
}

// ---------------------------------------------------------------------------
// Deepgram family
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct DeepgramAudio {
    /// Base64-encoded audio bytes
    body: String,
    #[serde(rename = "contentType")]
    content_type: String,
}

/// Request schema for Deepgram-family models. Every feature flag is
/// optional and defaulted off except language auto-detection.
#[derive(Debug, Default, Serialize)]
struct DeepgramRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<DeepgramAudio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_topic_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_intent_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detect_entities: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detect_language: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diarize: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dictation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_words: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyterm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    measurements: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mip_opt_out: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    multichannel: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    numerals: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    paragraphs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profanity_filter: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    punctuate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sentiment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    smart_format: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topics: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    utterances: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    utt_split: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct DeepgramDocument {
    #[serde(default)]
    results: DeepgramResults,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeepgramResults {
    #[serde(default)]
    pub(crate) channels: Vec<DeepgramChannel>,
    #[serde(default)]
    summary: DeepgramSummary,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeepgramChannel {
    #[serde(default)]
    pub(crate) alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeepgramAlternative {
    #[serde(default)]
    pub(crate) transcript: String,
}

#[derive(Debug, Default, Deserialize)]
struct DeepgramSummary {
    #[serde(default)]
    result: String,
    #[serde(default)]
    short: String,
}

impl DeepgramResults {
    /// Walk `channels[0].alternatives[0].transcript`, then the summary
    /// fields, in that priority order.
    fn transcript(&self) -> Option<String> {
        let primary = self
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .filter(|t| !t.is_empty());
        primary
            .or_else(|| (!self.summary.result.is_empty()).then(|| self.summary.result.clone()))
            .or_else(|| (!self.summary.short.is_empty()).then(|| self.summary.short.clone()))
    }
}

/// Cascade: structured walk (envelope-tolerant), then raw body.
fn parse_cf_deepgram_response(body: &str) -> Result<String> {
    if let Some(document) = enveloped::<DeepgramDocument>(body) {
        if let Some(transcript) = document.results.transcript() {
            debug!(
                channels = document.results.channels.len(),
                "Deepgram response parsed"
            );
            return Ok(transcript);
        }
    }

    raw_body_fallback(body)
}

/// Cloudflare Workers AI client for Deepgram-family models.
#[derive(Debug, Clone)]
pub struct CloudflareDeepgramClient {
    client: reqwest::Client,
    config: CloudflareConfig,
}

impl CloudflareDeepgramClient {
    /// Create a new client with the given configuration.
    pub fn new(config: CloudflareConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Transcriber for CloudflareDeepgramClient {
    async fn transcribe(&self, audio: &AudioPayload, language: Option<&str>) -> Result<String> {
        let url = self.config.run_url(DEFAULT_DEEPGRAM_MODEL);
        let request = DeepgramRequest {
            audio: Some(DeepgramAudio {
                body: BASE64.encode(audio.data()),
                content_type: audio.content_type().to_string(),
            }),
            detect_language: Some(true),
            language: language.map(str::to_string),
            ..Default::default()
        };

        debug!(
            url = %url,
            audio_bytes = audio.len(),
            content_type = audio.content_type(),
            language = ?language,
            "Sending transcription request to Cloudflare Deepgram"
        );

        let body = post_json(&self.client, &url, &self.config.api_key, &request).await?;
        parse_cf_deepgram_response(&body)
    }

    fn name(&self) -> &'static str {
        "cloudflare-deepgram"
    }
}
