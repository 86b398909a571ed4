//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;
use tracing::debug;

use super::defaults::*;
use super::{global_config_path, Config};

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: LibConfigBuilder<config::builder::DefaultState>,
    key: &str,
    value: T,
) -> Result<LibConfigBuilder<config::builder::DefaultState>> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `WATCHPIPE_` and use double underscores
    /// for nested values. For example:
    /// - `WATCHPIPE_WATCHER__DEBOUNCE_MS=150`
    /// - `WATCHPIPE_CHANNEL__CAPACITY=1024`
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ConfigLib::builder();

        let builder = set_config_default(builder, "watcher.root", DEFAULT_WATCH_ROOT)?;
        let builder = set_config_default(
            builder,
            "watcher.debounce_ms",
            default_debounce_ms() as i64,
        )?;
        let mut builder = set_config_default(
            builder,
            "watcher.max_file_size",
            default_max_file_size() as i64,
        )?;

        // Add the config file if it exists
        if path.exists() {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path));
        } else {
            debug!("No configuration file at {}, using defaults", path.display());
        }

        builder = builder.add_source(
            Environment::with_prefix("WATCHPIPE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from a single file
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (~/.watchpipe/config.toml or custom --config path)
    /// 3. Environment variables (WATCHPIPE_*)
    ///
    /// A missing global config file means defaults; a missing explicit path is
    /// an error.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) if !path.exists() => Err(Error::config(format!(
                "Config file not found: {}",
                path.display()
            ))),
            Some(path) => Self::from_file(path),
            None => Self::from_file(&global_config_path()?),
        }
    }
}
