//! Configuration management for voxbot.
//!
//! Backend credentials are all optional here; the registry validates the
//! ones the selected backend actually needs when it is built.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::APP_NAME;

/// Core configuration structure for the bot.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Backend to use at startup (groq, cloudflare-whisper,
    /// cloudflare-deepgram, deepgram). When unset, the first backend with
    /// credentials configured wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    /// Language hint for transcription (ISO 639-1 code). Empty means
    /// auto-detect.
    #[serde(default = "default_language", skip_serializing_if = "is_default_language")]
    pub language: String,

    /// Groq API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groq_api_key: Option<String>,

    /// Model for the Groq backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groq_model: Option<String>,

    /// Cloudflare account identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudflare_account_id: Option<String>,

    /// Cloudflare API token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudflare_api_key: Option<String>,

    /// Model for the cloudflare-whisper backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudflare_whisper_model: Option<String>,

    /// Model for the cloudflare-deepgram backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudflare_deepgram_model: Option<String>,

    /// Deepgram API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deepgram_api_key: Option<String>,

    /// Model for the standalone Deepgram backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deepgram_model: Option<String>,

    /// Directory for per-job scratch audio files
    #[serde(
        default = "default_scratch_dir",
        skip_serializing_if = "is_default_scratch_dir"
    )]
    pub scratch_dir: PathBuf,

    /// File holding the exclusion list, one identifier per line
    #[serde(
        default = "default_exclusion_file",
        skip_serializing_if = "is_default_exclusion_file"
    )]
    pub exclusion_file: PathBuf,

    /// Prefix for transcript replies, rendered as `*<prefix>:* _<text>_`
    #[serde(
        default = "default_reply_prefix",
        skip_serializing_if = "is_default_reply_prefix"
    )]
    pub reply_prefix: String,

    /// Upper bound on concurrently running transcription jobs
    #[serde(
        default = "default_max_concurrent_jobs",
        skip_serializing_if = "is_default_max_concurrent_jobs"
    )]
    pub max_concurrent_jobs: usize,
}

fn default_language() -> String {
    "pt".to_string()
}

fn is_default_language(v: &String) -> bool {
    v == "pt"
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("messages")
}

fn is_default_scratch_dir(v: &PathBuf) -> bool {
    *v == default_scratch_dir()
}

fn default_exclusion_file() -> PathBuf {
    PathBuf::from("data/exclude.txt")
}

fn is_default_exclusion_file(v: &PathBuf) -> bool {
    *v == default_exclusion_file()
}

fn default_reply_prefix() -> String {
    "Transcrição automática".to_string()
}

fn is_default_reply_prefix(v: &String) -> bool {
    *v == default_reply_prefix()
}

fn default_max_concurrent_jobs() -> usize {
    8
}

fn is_default_max_concurrent_jobs(v: &usize) -> bool {
    *v == 8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: None,
            language: default_language(),
            groq_api_key: None,
            groq_model: None,
            cloudflare_account_id: None,
            cloudflare_api_key: None,
            cloudflare_whisper_model: None,
            cloudflare_deepgram_model: None,
            deepgram_api_key: None,
            deepgram_model: None,
            scratch_dir: default_scratch_dir(),
            exclusion_file: default_exclusion_file(),
            reply_prefix: default_reply_prefix(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

impl Config {
    /// Get the startup backend name
    pub fn backend(&self) -> Option<&str> {
        self.backend.as_deref()
    }

    /// Language hint, `None` when set to empty (auto-detect)
    pub fn language(&self) -> Option<&str> {
        if self.language.is_empty() {
            None
        } else {
            Some(&self.language)
        }
    }

    /// True when at least one backend has credentials configured
    pub fn has_any_credentials(&self) -> bool {
        self.groq_api_key.is_some()
            || (self.cloudflare_account_id.is_some() && self.cloudflare_api_key.is_some())
            || self.deepgram_api_key.is_some()
    }
}

/// Manages loading and saving configuration files.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the default configuration directory.
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Creates a new ConfigManager with a specified configuration directory.
    #[cfg(test)]
    pub fn with_config_dir<P: AsRef<std::path::Path>>(dir: P) -> Self {
        let config_path = dir.as_ref().join(format!("{}.toml", APP_NAME));
        Self { config_path }
    }

    /// Returns the default path to the configuration file.
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to retrieve configuration directory")?;
        Ok(config_dir.join(APP_NAME).join(format!("{}.toml", APP_NAME)))
    }

    /// Loads the configuration from the config file or returns default.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let config_content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file at {:?}", self.config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file at {:?}", self.config_path))?;

        if !config.has_any_credentials() {
            warn!(
                "No backend credentials are set. Transcriptions will not work until a \
                 Groq, Cloudflare or Deepgram key is added to the config file."
            );
        }

        Ok(config)
    }

    /// Saves the configuration to the config file.
    pub fn save(&self, config: &Config) -> Result<()> {
        let config_dir = self
            .config_path
            .parent()
            .with_context(|| format!("Failed to get parent directory of {:?}", self.config_path))?;

        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create config directory at {:?}", config_dir))?;

        let serialized =
            toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, serialized)
            .with_context(|| format!("Failed to write config file at {:?}", self.config_path))?;

        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &std::path::Path {
        &self.config_path
    }
}
