//! Default values and functions for configuration

use std::path::PathBuf;

/// Debounce window used when none is configured
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Directory watched when none is configured
pub const DEFAULT_WATCH_ROOT: &str = "./source";

/// 10MB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub(crate) fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_WATCH_ROOT)
}

pub(crate) fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

pub(crate) fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}
