//! Groq Whisper API transcription backend.
//!
//! Groq exposes the OpenAI-compatible transcription endpoint: multipart
//! form in, a flat `{"text": ...}` object out.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{AudioPayload, REQUEST_TIMEOUT, Result, TranscribeError, Transcriber};

const DEFAULT_BASE_URL: &str = "https://api.groq.com";
const TRANSCRIPTION_PATH: &str = "/openai/v1/audio/transcriptions";
const DEFAULT_MODEL: &str = "whisper-large-v3";

/// Configuration for the Groq transcription client.
#[derive(Debug, Clone)]
pub struct GroqConfig {
    /// Groq API key
    pub api_key: String,

    /// Model to use (defaults to whisper-large-v3)
    pub model: Option<String>,

    /// Base URL override, used by tests against a local mock server.
    pub base_url: Option<String>,
}

impl GroqConfig {
    /// Create a new Groq config with the given API key.
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
        format!("{}{}", base.trim_end_matches('/'), TRANSCRIPTION_PATH)
    }
}

/// Groq Whisper API client.
#[derive(Debug, Clone)]
pub struct GroqClient {
    client: reqwest::Client,
    config: GroqConfig,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl GroqClient {
    /// Create a new Groq client with the given configuration.
    pub fn new(config: GroqConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Create a client from just an API key with default settings.
    pub fn from_api_key(api_key: impl Into<String>) -> Self {
        Self::new(GroqConfig::new(api_key))
    }
}

fn parse_response(body: &str) -> Result<String> {
    let response: TranscriptionResponse = serde_json::from_str(body)
        .map_err(|e| TranscribeError::MalformedResponse(e.to_string()))?;
    if response.text.is_empty() {
        return Err(TranscribeError::EmptyTranscript);
    }
    Ok(response.text)
}

#[async_trait]
impl Transcriber for GroqClient {
    async fn transcribe(&self, audio: &AudioPayload, language: Option<&str>) -> Result<String> {
        debug!(
            model = self.config.model(),
            audio_bytes = audio.len(),
            language = ?language,
            "Sending transcription request to Groq"
        );

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.data().to_vec())
                    .file_name("audio.ogg")
                    .mime_str(audio.content_type())
                    .map_err(|e| TranscribeError::MalformedResponse(e.to_string()))?,
            )
            .part(
                "model",
                reqwest::multipart::Part::text(self.config.model().to_string()),
            );

        if let Some(lang) = language {
            form = form.part("language", reqwest::multipart::Part::text(lang.to_string()));
        }

        let response = self
            .client
            .post(self.config.endpoint())
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .multipart(form)
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
        "groq"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_text_object() {
        assert_eq!(parse_response(r#"{"text":"hello there"}"#).unwrap(), "hello there");
    }

    #[test]
    fn empty_text_is_an_error() {
        assert!(matches!(
            parse_response(r#"{"text":""}"#),
            Err(TranscribeError::EmptyTranscript)
        ));
    }

    #[test]
    fn missing_text_field_is_malformed() {
        assert!(matches!(
            parse_response(r#"{"transcript":"hi"}"#),
            Err(TranscribeError::MalformedResponse(_))
        ));
    }

    #[test]
    fn endpoint_honors_base_url_override() {
        let config = GroqConfig::new("k").with_base_url("http://127.0.0.1:9999/");
        assert_eq!(
            config.endpoint(),
            "http://127.0.0.1:9999/openai/v1/audio/transcriptions"
        );
    }
}
