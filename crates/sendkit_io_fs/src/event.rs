//! Progress events emitted by a running export.

use std::path::PathBuf;
use std::sync::mpsc::Sender;

/// Worker-to-display notification. Purely informational: dropping events
/// never changes the outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyEvent {
    /// A source file was looked at (whether or not it qualifies).
    FileVisited(PathBuf),
    /// A file was written into the destination tree.
    FileCopied {
        /// Source file.
        source: PathBuf,
        /// Written destination file.
        destination: PathBuf,
    },
    /// A subdirectory was pruned from the walk.
    DirectorySkipped(PathBuf),
    /// An entry failed; the same text is recorded in the outcome.
    Error(String),
    /// Archive creation began.
    ArchiveStarted(PathBuf),
    /// Archive creation finished.
    ArchiveFinished {
        /// Written archive.
        path: PathBuf,
        /// Number of zip entries written.
        n_entries: u64,
    },
}

/// Receiver side of progress notifications.
pub trait ProgressSink {
    fn emit(&self, event: CopyEvent);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn emit(&self, _event: CopyEvent) {}
}

impl ProgressSink for Sender<CopyEvent> {
    fn emit(&self, event: CopyEvent) {
        // Display loop may already be gone.
        let _ = self.send(event);
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for &S {
    fn emit(&self, event: CopyEvent) {
        (**self).emit(event);
    }
}
