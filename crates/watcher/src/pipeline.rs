//! Wiring of source, dispatcher, channel and sink

use crate::channel::channel;
use crate::config::PipelineConfig;
use crate::dispatcher::Dispatcher;
use crate::reader::{FileReader, FsReader};
use crate::sink::{run_sink, LineSink, Sink};
use crate::source::{ChangeSource, EventSource};
use std::sync::Arc;
use tracing::info;
use watchpipe_core::{Error, Result};

/// The watch → debounce → read → deliver pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Watch the configured root and print every settled file to stdout
    ///
    /// Only a failure to set up the watch is returned; read and delivery
    /// errors are logged. With a live watch this never returns.
    pub async fn run(self) -> Result<usize> {
        let source = ChangeSource::watch(&self.config.root)?;
        let reader = FsReader::new(self.config.max_file_size);
        self.run_with(source, reader, LineSink::stdout()).await
    }

    /// Run the pipeline over the given collaborators
    ///
    /// The dispatcher and the sink run as two tasks joined only by the
    /// channel. Returns the number of delivered messages once the source is
    /// exhausted and the channel has drained.
    pub async fn run_with<S, R, K>(self, source: S, reader: R, sink: K) -> Result<usize>
    where
        S: EventSource + 'static,
        R: FileReader + 'static,
        K: Sink + 'static,
    {
        let (sender, receiver) = channel(self.config.channel);

        let dispatcher = Dispatcher::new(
            self.config.debounce_duration(),
            Arc::new(reader),
            sender,
        )
        .with_burst_policy(self.config.burst_policy)
        .with_read_policy(self.config.read_policy);

        info!(
            "Starting pipeline (debounce {}ms, {:?}, {:?})",
            self.config.debounce_ms, self.config.burst_policy, self.config.read_policy
        );

        let producer = tokio::spawn(dispatcher.run(source));
        let consumer = tokio::spawn(run_sink(receiver, sink));

        producer
            .await
            .map_err(|e| Error::with_context("Dispatcher task failed", e))?;
        let delivered = consumer
            .await
            .map_err(|e| Error::with_context("Sink task failed", e))?;

        info!("Pipeline finished after {} deliveries", delivered);
        Ok(delivered)
    }
}
