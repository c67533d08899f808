//! Core types and configuration for voxbot.
//!
//! This crate provides platform-agnostic configuration and persistent
//! state that can be used across all voxbot sub-crates.

mod config;
mod exclusion;

pub use config::{Config, ConfigManager};
pub use exclusion::ExclusionList;

/// Application name
pub const APP_NAME: &str = "voxbot";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";
