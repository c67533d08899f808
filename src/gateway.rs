//! Messaging-transport boundary.
//!
//! The chat transport (session handling, pairing, reconnects) lives
//! outside this crate. It delivers decoded [`MessageEvent`]s and we call
//! back into it to fetch media bytes and to send text replies.

use async_trait::async_trait;
use bytes::Bytes;

/// Reference to a downloadable media object attached to a message. The
/// transport uses the key and checksums to fetch and decrypt the bytes.
#[derive(Debug, Clone, Default)]
pub struct MediaRef {
    pub url: String,
    pub direct_path: String,
    pub media_key: Vec<u8>,
    pub file_sha256: Vec<u8>,
    pub file_enc_sha256: Vec<u8>,
    pub file_length: u64,
    pub mime_type: String,
    pub file_name: String,
}

/// One decoded inbound message event.
#[derive(Debug, Clone, Default)]
pub struct MessageEvent {
    /// Sender identifier (phone-number-like token)
    pub sender: String,
    /// Destination chat identifier; replies go here
    pub chat: String,
    pub is_group: bool,
    pub text: Option<String>,
    pub media: Option<MediaRef>,
}

impl MessageEvent {
    /// Whether this event carries an audio attachment.
    pub fn is_audio(&self) -> bool {
        self.media
            .as_ref()
            .is_some_and(|m| m.mime_type.starts_with("audio/"))
    }
}

/// Callback surface into the chat transport.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Fetch and decrypt the referenced media object.
    async fn download(&self, media: &MediaRef) -> anyhow::Result<Bytes>;

    /// Send a plain text message to a chat.
    async fn send_text(&self, chat: &str, text: &str) -> anyhow::Result<()>;
}
