//! Standalone Deepgram API transcription backend.
//!
//! Deepgram's `/v1/listen` takes the raw audio bytes as the request body
//! (no JSON envelope) with model selection in the query string and a
//! `Token` bearer scheme. Unlike the Cloudflare adapters the response
//! contract is fixed, so the parser is strict: a missing channel or
//! alternative is a hard parse error, not a reason to fall back.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::cloudflare::DeepgramChannel;
use crate::{AudioPayload, REQUEST_TIMEOUT, Result, TranscribeError, Transcriber};

const DEFAULT_BASE_URL: &str = "https://api.deepgram.com";
const DEFAULT_MODEL: &str = "nova-3";

/// Configuration for the standalone Deepgram client.
#[derive(Debug, Clone)]
pub struct DeepgramConfig {
    /// Deepgram API key
    pub api_key: String,

    /// Model to use (defaults to nova-3)
    pub model: Option<String>,

    /// Base URL override, used by tests against a local mock server.
    pub base_url: Option<String>,
}

impl DeepgramConfig {
    /// Create a new Deepgram config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            base_url: None,
        }
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Get the model name, using default if not set.
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!("{}/v1/listen", base.trim_end_matches('/'))
    }
}

/// Standalone Deepgram API client.
#[derive(Debug, Clone)]
pub struct DeepgramClient {
    client: reqwest::Client,
    config: DeepgramConfig,
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<DeepgramChannel>,
}

impl DeepgramClient {
    /// Create a new Deepgram client with the given configuration.
    pub fn new(config: DeepgramConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Create a client from just an API key with default settings.
    pub fn from_api_key(api_key: impl Into<String>) -> Self {
        Self::new(DeepgramConfig::new(api_key))
    }
}

fn parse_response(body: &str) -> Result<String> {
    let response: ListenResponse = serde_json::from_str(body)
        .map_err(|e| TranscribeError::MalformedResponse(e.to_string()))?;

    let channel = response
        .results
        .channels
        .first()
        .ok_or_else(|| TranscribeError::MalformedResponse("no channels in response".into()))?;
    let alternative = channel.alternatives.first().ok_or_else(|| {
        TranscribeError::MalformedResponse("no alternatives in first channel".into())
    })?;

    if alternative.transcript.is_empty() {
        return Err(TranscribeError::EmptyTranscript);
    }
    Ok(alternative.transcript.clone())
}

#[async_trait]
impl Transcriber for DeepgramClient {
    async fn transcribe(&self, audio: &AudioPayload, language: Option<&str>) -> Result<String> {
        let mut query = vec![("model", self.config.model()), ("smart_format", "true")];
        if let Some(lang) = language {
            query.push(("language", lang));
        }

        debug!(
            model = self.config.model(),
            audio_bytes = audio.len(),
            content_type = audio.content_type(),
            language = ?language,
            "Sending transcription request to Deepgram"
        );

        let response = self
            .client
            .post(self.config.endpoint())
            .timeout(REQUEST_TIMEOUT)
            .query(&query)
            .header("Authorization", format!("Token {}", self.config.api_key))
            .header("Content-Type", audio.content_type().to_string())
            .body(audio.data().clone())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TranscribeError::Api { status, body });
        }

        let body = response.text().await?;
        parse_response(&body)
    }

    fn name(&self) -> &'static str {
        "deepgram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transcript_path() {
        let body = r#"{"metadata":{"request_id":"abc"},"results":{"channels":[
            {"alternatives":[{"transcript":"boa tarde","confidence":0.97}]}]}}"#;
        assert_eq!(parse_response(body).unwrap(), "boa tarde");
    }

    #[test]
    fn missing_results_is_malformed() {
        assert!(matches!(
            parse_response("{}"),
            Err(TranscribeError::MalformedResponse(_))
        ));
    }

    #[test]
    fn empty_channels_is_malformed() {
        assert!(matches!(
            parse_response(r#"{"results":{"channels":[]}}"#),
            Err(TranscribeError::MalformedResponse(_))
        ));
    }

    #[test]
    fn empty_alternatives_is_malformed() {
        assert!(matches!(
            parse_response(r#"{"results":{"channels":[{"alternatives":[]}]}}"#),
            Err(TranscribeError::MalformedResponse(_))
        ));
    }

    #[test]
    fn empty_transcript_is_empty_result() {
        assert!(matches!(
            parse_response(r#"{"results":{"channels":[{"alternatives":[{"transcript":""}]}]}}"#),
            Err(TranscribeError::EmptyTranscript)
        ));
    }
}
