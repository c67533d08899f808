//! Event dispatch.
//!
//! One serial loop receives decoded events from the transport and hands
//! each audio message to an independently scheduled job, so a slow
//! download or provider call never blocks dispatch. Job concurrency is
//! bounded by a semaphore sized from the configuration.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, warn};
use voxbot_core::{Config, ExclusionList};
use voxbot_transcribe::{ActiveBackend, BackendKind, build_backend};

use crate::command::CommandRouter;
use crate::gateway::{MessageEvent, MessagingGateway};
use crate::job::TranscriptionJob;

/// The bot: exclusion state, backend selection and the dispatch loop.
pub struct Bot {
    gateway: Arc<dyn MessagingGateway>,
    exclusions: Arc<ExclusionList>,
    active: Arc<ActiveBackend>,
    router: CommandRouter,
    job_permits: Arc<Semaphore>,
    config: Config,
}

impl Bot {
    /// Build the bot from configuration. Fails when no transcription
    /// backend can be constructed from the configured credentials.
    pub fn new(gateway: Arc<dyn MessagingGateway>, config: Config) -> Result<Self> {
        let exclusions = Arc::new(ExclusionList::open(&config.exclusion_file));

        let backend = match config.backend() {
            Some(name) => {
                let kind: BackendKind = name
                    .parse()
                    .with_context(|| format!("invalid backend {name:?} in configuration"))?;
                build_backend(kind, &config)
                    .with_context(|| format!("cannot build configured backend {kind}"))?
            }
            None => {
                let mut found = None;
                for kind in BackendKind::ALL {
                    if let Ok(backend) = build_backend(kind, &config) {
                        found = Some(backend);
                        break;
                    }
                }
                match found {
                    Some(backend) => backend,
                    None => bail!(
                        "no transcription backend configured; set a backend name or \
                         credentials in the config file"
                    ),
                }
            }
        };
        info!(backend = backend.name(), "transcription backend selected");

        let active = Arc::new(ActiveBackend::new(backend));
        let router = CommandRouter::new(
            Arc::clone(&exclusions),
            Arc::clone(&active),
            config.clone(),
        );
        let job_permits = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));

        Ok(Self {
            gateway,
            exclusions,
            active,
            router,
            job_permits,
            config,
        })
    }

    /// Serial dispatch loop. Ends when the event channel closes;
    /// in-flight jobs run to completion on their own.
    pub async fn run(&self, mut events: mpsc::Receiver<MessageEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        info!("event channel closed, dispatcher stopping");
    }

    /// Classify and dispatch one event. Returns the join handle of the
    /// spawned job when the event started one.
    pub async fn handle_event(&self, event: MessageEvent) -> Option<tokio::task::JoinHandle<()>> {
        if event.is_group {
            debug!(from = %event.sender, "ignoring group message");
            return None;
        }

        // Administrative commands first; their replies are cheap and sent
        // inline from the dispatch loop.
        if let Some(text) = event.text.as_deref() {
            if let Some(reply) = self.router.handle(text) {
                if let Err(err) = self.gateway.send_text(&event.chat, &reply).await {
                    error!(to = %event.chat, err = format!("{err:#}"), "failed to send command reply");
                }
                return None;
            }
        }

        if self.exclusions.is_excluded(&event.chat) {
            debug!(to = %event.chat, "ignoring message to excluded destination");
            return None;
        }

        if !event.is_audio() {
            debug!(from = %event.sender, "ignoring non-audio message");
            return None;
        }

        info!(from = %event.sender, to = %event.chat, "received audio message");

        // Backend selection is read once here; a concurrent switch
        // affects the next job, never this one.
        let job = TranscriptionJob::new(
            Arc::clone(&self.gateway),
            self.active.current(),
            event,
            self.config.scratch_dir.clone(),
            self.config.language().map(str::to_string),
            self.config.reply_prefix.clone(),
        );

        let permits = Arc::clone(&self.job_permits);
        Some(tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("job semaphore closed, skipping job");
                    return;
                }
            };
            job.run().await;
        }))
    }

    /// The exclusion list, shared with spawned jobs and tests.
    pub fn exclusions(&self) -> &Arc<ExclusionList> {
        &self.exclusions
    }

    /// The active-backend holder.
    pub fn active_backend(&self) -> &Arc<ActiveBackend> {
        &self.active
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;

    use super::*;
    use crate::gateway::MediaRef;

    struct MockGateway {
        sent: Mutex<Vec<(String, String)>>,
        downloads: Mutex<usize>,
    }

    struct StubBackend;

    #[async_trait]
    impl voxbot_transcribe::Transcriber for StubBackend {
        async fn transcribe(
            &self,
            _audio: &voxbot_transcribe::AudioPayload,
            _language: Option<&str>,
        ) -> voxbot_transcribe::Result<String> {
            Ok("uma transcrição longa o suficiente".to_string())
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    impl MockGateway {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                downloads: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl MessagingGateway for MockGateway {
        async fn download(&self, _media: &MediaRef) -> anyhow::Result<Bytes> {
            *self.downloads.lock() += 1;
            Ok(Bytes::from_static(b"opusdata"))
        }

        async fn send_text(&self, chat: &str, text: &str) -> anyhow::Result<()> {
            self.sent.lock().push((chat.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn test_config(dir: &tempfile::TempDir) -> Config {
        Config {
            groq_api_key: Some("gsk-test".to_string()),
            deepgram_api_key: Some("dg-test".to_string()),
            exclusion_file: dir.path().join("exclude.txt"),
            scratch_dir: dir.path().join("messages"),
            ..Default::default()
        }
    }

    fn text_event(text: &str) -> MessageEvent {
        MessageEvent {
            sender: "111".to_string(),
            chat: "111".to_string(),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn audio_event(chat: &str) -> MessageEvent {
        MessageEvent {
            sender: chat.to_string(),
            chat: chat.to_string(),
            media: Some(MediaRef {
                mime_type: "audio/ogg".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn startup_requires_some_backend() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = MockGateway::new();
        let config = Config {
            exclusion_file: dir.path().join("exclude.txt"),
            ..Default::default()
        };
        assert!(Bot::new(gateway, config).is_err());
    }

    #[test]
    fn startup_rejects_invalid_backend_name() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = MockGateway::new();
        let config = Config {
            backend: Some("whisperx".to_string()),
            ..test_config(&dir)
        };
        assert!(Bot::new(gateway, config).is_err());
    }

    #[test]
    fn startup_picks_first_configured_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            groq_api_key: None,
            ..test_config(&dir)
        };
        let bot = Bot::new(MockGateway::new(), config).unwrap();
        assert_eq!(bot.active_backend().current().name(), "deepgram");
    }

    #[tokio::test]
    async fn group_messages_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = MockGateway::new();
        let bot = Bot::new(gateway.clone(), test_config(&dir)).unwrap();

        let mut event = audio_event("111");
        event.is_group = true;
        assert!(bot.handle_event(event).await.is_none());
        assert_eq!(*gateway.downloads.lock(), 0);
    }

    #[tokio::test]
    async fn command_reply_is_sent_inline() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = MockGateway::new();
        let bot = Bot::new(gateway.clone(), test_config(&dir)).unwrap();

        bot.handle_event(text_event("/exclude 222")).await;

        let sent = gateway.sent.lock().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "222 added to exclusion list.");
        assert!(bot.exclusions().is_excluded("222"));
    }

    #[tokio::test]
    async fn excluded_destination_spawns_no_job() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = MockGateway::new();
        let bot = Bot::new(gateway.clone(), test_config(&dir)).unwrap();

        bot.exclusions().add("333");
        assert!(bot.handle_event(audio_event("333")).await.is_none());
        assert_eq!(*gateway.downloads.lock(), 0);
    }

    #[tokio::test]
    async fn audio_event_spawns_a_job_against_the_active_backend() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = MockGateway::new();
        let bot = Bot::new(gateway.clone(), test_config(&dir)).unwrap();
        bot.active_backend().swap(Arc::new(StubBackend));

        let handle = bot.handle_event(audio_event("444")).await.unwrap();
        handle.await.unwrap();

        assert_eq!(*gateway.downloads.lock(), 1);
        let sent = gateway.sent.lock().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "444");
        assert_eq!(
            sent[0].1,
            "*Transcrição automática:* _uma transcrição longa o suficiente_"
        );
    }

    #[tokio::test]
    async fn backend_switch_applies_to_next_job() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = MockGateway::new();
        let bot = Bot::new(gateway.clone(), test_config(&dir)).unwrap();
        assert_eq!(bot.active_backend().current().name(), "groq");

        bot.handle_event(text_event("/backend deepgram")).await;
        assert_eq!(bot.active_backend().current().name(), "deepgram");
    }
}
