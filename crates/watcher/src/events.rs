//! Change event and message types
//!
//! This module defines the immutable values flowing through the pipeline:
//! change notifications coming in and decoded file contents going out.

use notify::EventKind;
use std::fmt;
use std::path::PathBuf;

/// Kind of file system change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// File was created
    Created,
    /// File contents or metadata were modified
    Modified,
    /// Anything else (removal, access, unknown)
    Other,
}

impl From<&EventKind> for ChangeKind {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => Self::Created,
            EventKind::Modify(_) => Self::Modified,
            _ => Self::Other,
        }
    }
}

/// A single change notification from the watch source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Type of change
    pub kind: ChangeKind,
    /// Affected paths, in the order the source reported them
    pub paths: Vec<PathBuf>,
}

impl ChangeEvent {
    /// Create a new change event
    pub fn new(kind: ChangeKind, paths: Vec<PathBuf>) -> Self {
        Self { kind, paths }
    }

    /// Shorthand for a creation event
    pub fn created<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self::new(ChangeKind::Created, paths.into_iter().map(Into::into).collect())
    }

    /// Shorthand for a modification event
    pub fn modified<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self::new(ChangeKind::Modified, paths.into_iter().map(Into::into).collect())
    }

    /// Shorthand for an event of any other kind
    pub fn other<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self::new(ChangeKind::Other, paths.into_iter().map(Into::into).collect())
    }

    /// Whether this event should trigger a read (creation or modification)
    pub fn is_qualifying(&self) -> bool {
        matches!(self.kind, ChangeKind::Created | ChangeKind::Modified)
    }
}

impl From<notify::Event> for ChangeEvent {
    fn from(event: notify::Event) -> Self {
        Self {
            kind: ChangeKind::from(&event.kind),
            paths: event.paths,
        }
    }
}

/// Decoded text of one file, produced after a burst settles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// File the text was read from
    pub path: PathBuf,
    /// Full decoded contents
    pub text: String,
}

impl Message {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
