//! Configuration types for the pipeline
//!
//! This module provides the immutable configuration handed to
//! [`Pipeline`](crate::Pipeline), with a builder for programmatic use and a
//! conversion from the layered [`watchpipe_core::Config`].

use crate::channel::ChannelConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use watchpipe_core::config::{
    BurstPolicy, OverflowPolicy, ReadPolicy, DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_WATCH_ROOT,
};

/// Immutable configuration for the watch/debounce/deliver pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory to watch recursively (default: ./source)
    pub root: PathBuf,
    /// Debounce window in milliseconds (default: 300ms)
    pub debounce_ms: u64,
    /// Paths read when a burst settles (default: last event)
    pub burst_policy: BurstPolicy,
    /// Partial read failure handling (default: collect partial)
    pub read_policy: ReadPolicy,
    /// Maximum file size to read in bytes (default: 10MB)
    pub max_file_size: u64,
    /// Queue between dispatcher and sink (default: unbounded)
    pub channel: ChannelConfig,
}

impl PipelineConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Get the debounce duration
    pub fn debounce_duration(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_WATCH_ROOT),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            burst_policy: BurstPolicy::default(),
            read_policy: ReadPolicy::default(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            channel: ChannelConfig::unbounded(),
        }
    }
}

impl From<&watchpipe_core::Config> for PipelineConfig {
    fn from(config: &watchpipe_core::Config) -> Self {
        Self {
            root: config.watcher.root.clone(),
            debounce_ms: config.watcher.debounce_ms,
            burst_policy: config.watcher.burst_policy,
            read_policy: config.watcher.read_policy,
            max_file_size: config.watcher.max_file_size,
            channel: ChannelConfig::from(&config.channel),
        }
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the watch root
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root = root.into();
        self
    }

    /// Set debounce window in milliseconds
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.debounce_ms = ms;
        self
    }

    /// Set the burst path policy
    pub fn burst_policy(mut self, policy: BurstPolicy) -> Self {
        self.config.burst_policy = policy;
        self
    }

    /// Set the read failure policy
    pub fn read_policy(mut self, policy: ReadPolicy) -> Self {
        self.config.read_policy = policy;
        self
    }

    /// Set maximum file size
    pub fn max_file_size(mut self, size: u64) -> Self {
        self.config.max_file_size = size;
        self
    }

    /// Bound the channel
    pub fn channel_capacity(mut self, capacity: usize, overflow: OverflowPolicy) -> Self {
        self.config.channel = ChannelConfig::bounded(capacity, overflow);
        self
    }

    /// Build the configuration
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}
