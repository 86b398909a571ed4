//! File system change sources
//!
//! This module wraps the notify crate behind the [`EventSource`] trait so
//! the dispatcher can be driven by a real directory watch or by an
//! in-memory stream of events.

use crate::events::ChangeEvent;
use async_trait::async_trait;
use notify::{
    Config as NotifyConfig, Event as NotifyEvent, RecommendedWatcher, RecursiveMode,
    Watcher as NotifyWatcher,
};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{error, info, trace};
use watchpipe_core::{Error, Result};

/// A lazy, non-restartable sequence of change events
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next event. `None` means the source is exhausted.
    async fn next_event(&mut self) -> Option<ChangeEvent>;
}

#[async_trait]
impl EventSource for mpsc::UnboundedReceiver<ChangeEvent> {
    async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.recv().await
    }
}

#[async_trait]
impl EventSource for mpsc::Receiver<ChangeEvent> {
    async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.recv().await
    }
}

/// Recursive watch of one directory
///
/// Events are pushed by notify at their own pace into an unbounded queue;
/// there is no back-pressure towards the operating system.
pub struct ChangeSource {
    root: PathBuf,
    /// Dropping the watcher stops notifications
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl ChangeSource {
    /// Start watching `root` recursively
    ///
    /// Fails with [`Error::Watcher`] if the root is missing, is not a
    /// directory, or the platform watcher cannot be created.
    pub fn watch(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        let metadata = std::fs::metadata(&root)
            .map_err(|e| Error::watcher(format!("Cannot watch {root:?}: {e}")))?;
        if !metadata.is_dir() {
            return Err(Error::watcher(format!(
                "Watch root {root:?} is not a directory"
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = Self::create_notify_watcher(tx)?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| Error::watcher(format!("Failed to watch path {root:?}: {e}")))?;

        info!("Watching path: {:?} (recursive)", root);

        Ok(Self {
            root,
            _watcher: watcher,
            events: rx,
        })
    }

    fn create_notify_watcher(
        tx: mpsc::UnboundedSender<ChangeEvent>,
    ) -> Result<RecommendedWatcher> {
        RecommendedWatcher::new(
            move |res: std::result::Result<NotifyEvent, notify::Error>| match res {
                Ok(event) => {
                    trace!("Received notify event: {:?}", event);
                    if tx.send(ChangeEvent::from(event)).is_err() {
                        trace!("Change source dropped, discarding event");
                    }
                }
                Err(e) => {
                    error!("Notify error: {}", e);
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::watcher(format!("Failed to create watcher: {e}")))
    }

    /// The watched directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl std::fmt::Debug for ChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSource")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventSource for ChangeSource {
    async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_missing_root_is_watch_error() {
        let dir = TempDir::new().expect("test setup failed");
        let err = ChangeSource::watch(dir.path().join("nope")).expect_err("root does not exist");
        assert!(matches!(err, Error::Watcher(_)));
    }

    #[test]
    fn test_file_root_is_watch_error() {
        let dir = TempDir::new().expect("test setup failed");
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").expect("test setup failed");

        let err = ChangeSource::watch(&file).expect_err("root is a file");
        assert!(err.to_string().contains("is not a directory"));
    }

    #[tokio::test]
    async fn test_watch_reports_root() {
        let dir = TempDir::new().expect("test setup failed");
        let source = ChangeSource::watch(dir.path()).expect("test setup failed");
        assert_eq!(source.root(), dir.path());
    }

    #[tokio::test]
    async fn test_in_memory_source() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(ChangeEvent::modified(["a.txt"]))
            .expect("test setup failed");
        drop(tx);

        let first = rx.next_event().await;
        assert_eq!(first, Some(ChangeEvent::modified(["a.txt"])));
        assert_eq!(rx.next_event().await, None);
    }

    #[tokio::test]
    async fn test_file_creation_produces_qualifying_event() {
        let dir = TempDir::new().expect("test setup failed");
        let mut source = ChangeSource::watch(dir.path()).expect("test setup failed");

        tokio::time::sleep(Duration::from_millis(100)).await;
        let file = dir.path().join("new.txt");
        tokio::fs::write(&file, "content")
            .await
            .expect("test setup failed");

        let found = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(event) = source.next_event().await {
                let touches_file = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == file.file_name());
                if event.is_qualifying() && touches_file {
                    return true;
                }
            }
            false
        })
        .await
        .expect("timed out waiting for event");

        assert!(found);
    }
}
