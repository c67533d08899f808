//! Wire-level adapter tests against a local mock server.

use voxbot_transcribe::{
    AudioPayload, Bytes, CloudflareConfig, CloudflareDeepgramClient, CloudflareWhisperClient,
    DeepgramClient, DeepgramConfig, GroqClient, GroqConfig, TranscribeError, Transcriber,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload() -> AudioPayload {
    AudioPayload::new(Bytes::from_static(b"fake-opus-bytes"), "voice.opus")
}

#[tokio::test]
async fn groq_happy_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/audio/transcriptions"))
        .and(header("Authorization", "Bearer gsk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "text": "bom dia, tudo bem?"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GroqClient::new(GroqConfig::new("gsk-test").with_base_url(server.uri()));
    let text = client.transcribe(&payload(), Some("pt")).await.unwrap();
    assert_eq!(text, "bom dia, tudo bem?");
}

#[tokio::test]
async fn groq_surfaces_error_body_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/audio/transcriptions"))
        .respond_with(
            ResponseTemplate::new(429).set_body_string(r#"{"error":"rate limit exceeded"}"#),
        )
        .mount(&server)
        .await;

    let client = GroqClient::new(GroqConfig::new("gsk-test").with_base_url(server.uri()));
    let err = client.transcribe(&payload(), None).await.unwrap_err();
    match err {
        TranscribeError::Api { status, body } => {
            assert_eq!(status, 429);
            assert!(body.contains("rate limit exceeded"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn cloudflare_whisper_wrapped_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/client/v4/accounts/acc-1/ai/run/@cf/openai/whisper-large-v3-turbo"))
        .and(header("Authorization", "Bearer cf-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": { "text": "olá" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = CloudflareConfig::new("acc-1", "cf-test").with_base_url(server.uri());
    let client = CloudflareWhisperClient::new(config);
    assert_eq!(client.transcribe(&payload(), None).await.unwrap(), "olá");
}

#[tokio::test]
async fn cloudflare_deepgram_summary_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/client/v4/accounts/acc-1/ai/run/@cf/deepgram/nova-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": { "results": {
                "channels": [],
                "summary": { "short": "resumo curto" }
            }}
        })))
        .mount(&server)
        .await;

    let config = CloudflareConfig::new("acc-1", "cf-test").with_base_url(server.uri());
    let client = CloudflareDeepgramClient::new(config);
    assert_eq!(
        client.transcribe(&payload(), None).await.unwrap(),
        "resumo curto"
    );
}

#[tokio::test]
async fn deepgram_sends_raw_bytes_with_token_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/listen"))
        .and(query_param("model", "nova-3"))
        .and(query_param("smart_format", "true"))
        .and(query_param("language", "pt"))
        .and(header("Authorization", "Token dg-test"))
        .and(header("Content-Type", "audio/opus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": { "channels": [
                { "alternatives": [ { "transcript": "boa noite" } ] }
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        DeepgramClient::new(DeepgramConfig::new("dg-test").with_base_url(server.uri()));
    assert_eq!(
        client.transcribe(&payload(), Some("pt")).await.unwrap(),
        "boa noite"
    );
}

#[tokio::test]
async fn deepgram_is_strict_about_missing_channels() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/listen"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": { "channels": [] }
        })))
        .mount(&server)
        .await;

    let client =
        DeepgramClient::new(DeepgramConfig::new("dg-test").with_base_url(server.uri()));
    let err = client.transcribe(&payload(), None).await.unwrap_err();
    assert!(matches!(err, TranscribeError::MalformedResponse(_)));
}
