//! End-to-end handling of one inbound audio message.
//!
//! Pipeline: download the media, persist it to a per-job scratch file,
//! invoke the backend resolved at job start, reply with the transcript,
//! clean up. The scratch file is owned by a scope guard so every exit
//! path, including errors, removes it.
//!
//! Failure policy: errors are logged and the job ends silently; no reply
//! is ever sent for a failed job, and nothing is retried.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use voxbot_transcribe::{AudioPayload, Transcriber};

use crate::gateway::{MessageEvent, MessagingGateway};

/// Transcripts at or below this many characters after trimming are
/// treated as noise and silently dropped.
const MIN_REPLY_LEN: usize = 5;

/// How a completed job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Transcript sent back to the chat
    Replied,
    /// Transcript too short to be worth a reply
    Discarded,
}

/// One message's transcription lifecycle.
pub struct TranscriptionJob {
    gateway: Arc<dyn MessagingGateway>,
    backend: Arc<dyn Transcriber>,
    event: MessageEvent,
    scratch_dir: PathBuf,
    language: Option<String>,
    reply_prefix: String,
}

impl TranscriptionJob {
    pub fn new(
        gateway: Arc<dyn MessagingGateway>,
        backend: Arc<dyn Transcriber>,
        event: MessageEvent,
        scratch_dir: PathBuf,
        language: Option<String>,
        reply_prefix: String,
    ) -> Self {
        Self {
            gateway,
            backend,
            event,
            scratch_dir,
            language,
            reply_prefix,
        }
    }

    /// Run the job to completion, swallowing errors per the failure
    /// policy above.
    pub async fn run(self) {
        let sender = self.event.sender.clone();
        let backend = self.backend.name();
        match self.process().await {
            Ok(JobOutcome::Replied) => {
                info!(from = %sender, backend, "transcribed and replied");
            }
            Ok(JobOutcome::Discarded) => {
                info!(from = %sender, backend, "transcript below reply threshold, dropped");
            }
            Err(err) => {
                error!(from = %sender, backend, err = format!("{err:#}"), "audio job failed");
            }
        }
    }

    async fn process(&self) -> Result<JobOutcome> {
        let media = self
            .event
            .media
            .as_ref()
            .context("event carries no media reference")?;

        let data = self
            .gateway
            .download(media)
            .await
            .context("failed to download audio")?;
        debug!(bytes = data.len(), "audio downloaded");

        let scratch = ScratchFile::write(&self.scratch_dir, &data).await?;
        let payload = AudioPayload::new(data, scratch.file_name());

        let text = self
            .backend
            .transcribe(&payload, self.language.as_deref())
            .await
            .context("failed to transcribe audio")?;

        let trimmed = text.trim();
        let chars = trimmed.chars().count();
        if chars <= MIN_REPLY_LEN {
            debug!(chars, "transcript too short");
            return Ok(JobOutcome::Discarded);
        }

        let reply = format!("*{}:* _{}_", self.reply_prefix, trimmed);
        self.gateway
            .send_text(&self.event.chat, &reply)
            .await
            .context("failed to send reply")?;

        Ok(JobOutcome::Replied)
    }
}

/// Scoped ownership of a per-job scratch file. Removing the file on drop
/// guarantees cleanup on every exit path out of the pipeline.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Write `data` to a uniquely named file under `dir`, creating the
    /// directory on demand. The name is always `.ogg`-suffixed regardless
    /// of the actual codec; providers sniff the container themselves.
    async fn write(dir: &Path, data: &Bytes) -> Result<Self> {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create scratch directory {}", dir.display()))?;

        let stamp = jiff::Zoned::now().strftime("%Y%m%d%H%M%S").to_string();
        let path = dir.join(format!("{}-{}.ogg", Uuid::new_v4(), stamp));
        fs::write(&path, data)
            .await
            .with_context(|| format!("failed to write scratch file {}", path.display()))?;

        debug!(path = %path.display(), "audio saved to scratch file");
        Ok(Self { path })
    }

    fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.ogg")
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), %err, "failed to remove scratch file");
        } else {
            debug!(path = %self.path.display(), "scratch file removed");
        }
    }
}
