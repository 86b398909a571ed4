#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Debounced file change delivery
//!
//! This crate watches a directory and turns bursts of file changes into
//! messages carrying each changed file's text:
//! - Recursive watching through the notify crate
//! - Debouncing with explicit settlement of superseded calls
//! - Concurrent file reads with per-path failure reporting
//! - A FIFO channel decoupling the producer from the consumer
//!
//! # Example
//!
//! ```no_run
//! use watchpipe_watcher::{Pipeline, PipelineConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::builder()
//!     .root("./source")
//!     .debounce_ms(300)
//!     .build();
//!
//! // Runs until the process is terminated
//! Pipeline::new(config).run().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod pipeline;

pub mod channel;
pub mod debouncer;
pub mod dispatcher;
pub mod events;
pub mod reader;
pub mod sink;
pub mod source;

// Public exports
pub use channel::{ChannelConfig, Receiver, SendOutcome, Sender};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use debouncer::{DebouncedCall, Debouncer, Settlement};
pub use dispatcher::Dispatcher;
pub use events::{ChangeEvent, ChangeKind, Message};
pub use pipeline::Pipeline;
pub use reader::{FileReader, FsReader, ReadOutcome};
pub use sink::{run_sink, LineSink, Sink};
pub use source::{ChangeSource, EventSource};
pub use watchpipe_core::config::{BurstPolicy, OverflowPolicy, ReadPolicy};
