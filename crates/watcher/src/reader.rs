//! Concurrent loading of file contents

use async_trait::async_trait;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use tracing::trace;
use watchpipe_core::config::DEFAULT_MAX_FILE_SIZE;
use watchpipe_core::{Error, Result};

/// Result of reading one path
pub type ReadOutcome = (PathBuf, Result<String>);

/// Loads the text of changed files
#[async_trait]
pub trait FileReader: Send + Sync {
    /// Read the full decoded text of one file
    async fn read_text(&self, path: &Path) -> Result<String>;

    /// Read every path concurrently
    ///
    /// Outcomes come back in input order, one per path. A failure for one
    /// path does not affect the others.
    async fn read_all(&self, paths: &[PathBuf]) -> Vec<ReadOutcome> {
        join_all(paths.iter().map(|path| async move {
            let outcome = self.read_text(path).await;
            (path.clone(), outcome)
        }))
        .await
    }
}

/// Reads UTF-8 files from the local file system
#[derive(Debug, Clone)]
pub struct FsReader {
    max_file_size: u64,
}

impl FsReader {
    /// Create a reader that rejects files larger than `max_file_size` bytes
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }
}

impl Default for FsReader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

#[async_trait]
impl FileReader for FsReader {
    async fn read_text(&self, path: &Path) -> Result<String> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| Error::read(path, e.to_string()))?;

        if metadata.is_dir() {
            return Err(Error::read(path, "is a directory"));
        }
        if metadata.len() > self.max_file_size {
            return Err(Error::read(
                path,
                format!(
                    "file size {} exceeds limit of {} bytes",
                    metadata.len(),
                    self.max_file_size
                ),
            ));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::read(path, e.to_string()))?;
        trace!("Read {} bytes from {:?}", bytes.len(), path);

        String::from_utf8(bytes).map_err(|e| Error::read(path, format!("invalid UTF-8: {e}")))
    }
}
