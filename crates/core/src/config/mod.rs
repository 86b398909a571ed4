//! Configuration module for watchpipe
//!
//! This module provides configuration structures and loading mechanisms.
//! Configuration can be loaded from TOML files and/or environment variables.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use defaults::*;

pub use defaults::{DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_FILE_SIZE, DEFAULT_WATCH_ROOT};

/// Returns the path to the global configuration file
///
/// The global config is stored at `~/.watchpipe/config.toml`.
pub fn global_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".watchpipe").join("config.toml"))
}

/// Which paths a burst of events reads once its debounce window elapses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurstPolicy {
    /// Only the paths carried by the last event of the burst
    #[default]
    LastEvent,
    /// Every distinct path touched during the burst, in first-seen order
    Union,
}

/// What happens to a burst when some of its files cannot be read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadPolicy {
    /// Deliver every file that was read, log the failures
    #[default]
    CollectPartial,
    /// Deliver nothing from the burst if any file failed
    FailFast,
}

/// Behaviour of a bounded channel when its buffer is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// The producer waits for space
    #[default]
    Block,
    /// Evict the oldest buffered message to make room
    DropOldest,
    /// Discard the message being sent
    DropNewest,
}

/// Configuration for the watch and debounce stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherSettings {
    /// Directory to watch (recursively)
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Debounce window in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Paths read when a burst settles
    #[serde(default)]
    pub burst_policy: BurstPolicy,

    /// Partial-failure policy for reads within one burst
    #[serde(default)]
    pub read_policy: ReadPolicy,

    /// Files larger than this many bytes are reported as read errors
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

/// Configuration for the queue between the dispatcher and the sink
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Maximum buffered messages; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,

    /// Applied only when `capacity` is set
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

/// Main configuration structure for watchpipe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Watch and debounce configuration
    #[serde(default)]
    pub watcher: WatcherSettings,

    /// Channel configuration
    #[serde(default)]
    pub channel: ChannelSettings,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            root: default_root(),
            debounce_ms: default_debounce_ms(),
            burst_policy: BurstPolicy::default(),
            read_policy: ReadPolicy::default(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.watcher.root.as_os_str().is_empty() {
            return Err(Error::config("watcher.root must not be empty".to_string()));
        }

        if self.watcher.max_file_size == 0 {
            return Err(Error::config(
                "watcher.max_file_size must be greater than 0".to_string(),
            ));
        }

        if self.channel.capacity == Some(0) {
            return Err(Error::config(
                "channel.capacity must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Saves the configuration to a TOML file
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, toml_string)
            .map_err(|e| Error::config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }
}
