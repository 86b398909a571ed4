#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Core types for the watchpipe file delivery pipeline
//!
//! This crate provides the foundations shared by the watcher and the CLI:
//!
//! - **Configuration**: layered loading from TOML files and environment
//! - **Error handling**: unified error type and result alias
//!

pub mod config;
pub mod error;

// Re-export main types for convenience
pub use config::{
    BurstPolicy, ChannelSettings, Config, OverflowPolicy, ReadPolicy, WatcherSettings,
};
pub use error::{Error, Result, ResultExt};
