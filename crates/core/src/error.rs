use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for watchpipe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for watchpipe operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The watch source could not be set up. Fatal: no events can be observed.
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// A file could not be read or decoded after a change
    #[error("Read error in {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    /// The sink's output destination failed
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a watcher error
    pub fn watcher(msg: impl Into<String>) -> Self {
        Self::Watcher(msg.into())
    }

    /// Creates a read error for the given path
    pub fn read(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Read {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates a delivery error
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether the error is local to one burst or one message
    ///
    /// Recoverable errors are logged where they occur and never stop the
    /// pipeline; everything else aborts start-up.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Delivery(_))
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}
