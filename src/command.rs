//! Administrative command handling.
//!
//! Commands arrive as the text body of a direct message. The router
//! mutates the exclusion list or the active backend and produces the
//! reply text; sending it is the dispatcher's business. Anything that
//! does not start with a known prefix is not a command.

use std::sync::Arc;

use tracing::info;
use voxbot_core::{Config, ExclusionList};
use voxbot_transcribe::{ActiveBackend, BackendKind, build_backend};

/// Routes administrative commands to their effects.
pub struct CommandRouter {
    exclusions: Arc<ExclusionList>,
    active: Arc<ActiveBackend>,
    config: Config,
}

impl CommandRouter {
    pub fn new(exclusions: Arc<ExclusionList>, active: Arc<ActiveBackend>, config: Config) -> Self {
        Self {
            exclusions,
            active,
            config,
        }
    }

    /// Handle a message text. Returns the reply to send, or `None` when
    /// the text is not an administrative command.
    pub fn handle(&self, text: &str) -> Option<String> {
        if let Some(rest) = text.strip_prefix("/exclude") {
            info!(command = "/exclude", "executing admin command");
            return Some(self.exclude(rest.trim()));
        }
        if let Some(rest) = text.strip_prefix("/include") {
            info!(command = "/include", "executing admin command");
            return Some(self.include(rest.trim()));
        }
        if let Some(rest) = text.strip_prefix("/backend") {
            info!(command = "/backend", "executing admin command");
            return Some(self.backend(rest.trim()));
        }
        None
    }

    fn exclude(&self, id: &str) -> String {
        if id.is_empty() {
            let excluded = self.exclusions.all();
            if excluded.is_empty() {
                return "No users are currently excluded from transcription.".to_string();
            }
            let mut reply = "Currently excluded users:\n".to_string();
            for entry in excluded {
                reply.push_str("- ");
                reply.push_str(&entry);
                reply.push('\n');
            }
            return reply;
        }
        self.exclusions.add(id);
        format!("{id} added to exclusion list.")
    }

    fn include(&self, id: &str) -> String {
        if id.is_empty() {
            return "Usage: /include <number> - Remove a number from the exclusion list."
                .to_string();
        }
        if self.exclusions.remove(id) {
            format!("{id} removed from exclusion list.")
        } else {
            format!("{id} not in exclusion list.")
        }
    }

    fn backend(&self, name: &str) -> String {
        if name.is_empty() {
            return format!(
                "Usage: /backend <name> - Switch transcription backend. Available: {}.",
                available_backends()
            );
        }
        let kind: BackendKind = match name.parse() {
            Ok(kind) => kind,
            Err(_) => {
                return format!("Unknown backend {name}. Available: {}.", available_backends());
            }
        };
        match build_backend(kind, &self.config) {
            Ok(backend) => {
                self.active.swap(backend);
                format!("Transcription backend switched to {kind}.")
            }
            Err(err) => format!("Cannot switch to {kind}: {err}."),
        }
    }
}

fn available_backends() -> String {
    BackendKind::ALL
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join(", ")
}
