//! watchpipe CLI - print files as they change
//!
//! This binary watches a directory and writes the contents of every file
//! that settles after a burst of edits to standard output, one line per file.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use watchpipe_core::config::Config;
use watchpipe_watcher::{Pipeline, PipelineConfig};

#[derive(Debug, Parser)]
#[command(name = "watchpipe")]
#[command(about = "Print the contents of changed files once edits settle")]
#[command(version)]
struct Cli {
    /// Directory to watch (default: ./source)
    #[arg(value_name = "DIR")]
    root: Option<PathBuf>,

    /// Debounce window in milliseconds (default: 300)
    #[arg(short, long, value_name = "MS")]
    debounce_ms: Option<u64>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

// Dispatcher and sink share one cooperative thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose)?;

    let config = load_config(&cli)?;
    debug!("Effective configuration: {:?}", config);

    let delivered = Pipeline::new(PipelineConfig::from(&config))
        .run()
        .await
        .with_context(|| format!("Failed to watch {}", config.watcher.root.display()))?;

    info!("Change source closed after {} deliveries", delivered);
    Ok(())
}

/// Initialize logging system
///
/// Logs go to stderr; stdout carries only delivered file contents.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "watchpipe={level},watchpipe_watcher={level},watchpipe_core={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(())
}

/// Load layered configuration and apply command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(root) = &cli.root {
        config.watcher.root = root.clone();
    }
    if let Some(debounce_ms) = cli.debounce_ms {
        config.watcher.debounce_ms = debounce_ms;
    }

    config.validate()?;
    Ok(config)
}
