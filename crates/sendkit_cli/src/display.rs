//! Terminal rendering of a running export and of its final outcome.

use std::io::{self, IsTerminal, Stderr, Write};
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tracing_subscriber::fmt::MakeWriter;

use sendkit_io_fs::{CopyEvent, CopyJobController, EnumRunStatus, ReportCopy, RunError};

use crate::signal;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) const EXIT_OK: u8 = 0;
pub(crate) const EXIT_COMPLETED_WITH_ERRORS: u8 = 1;
pub(crate) const EXIT_VALIDATION: u8 = 2;
pub(crate) const EXIT_CANCELLED: u8 = 130;

////////////////////////////////////////////////////////////////////////////////
// #region StderrSharing

/// A `\r` progress line is currently drawn on stderr.
static PROGRESS_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Serializes stderr writes between the progress line and tracing.
static STDERR_LOCK: Mutex<()> = Mutex::new(());

fn acquire_stderr_lock() -> MutexGuard<'static, ()> {
    STDERR_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Tracing writer that wipes the progress line before each log record, so
/// log output and the live line never share a terminal row.
pub(crate) struct ProgressAwareStderr;

/// Holds the stderr lock for one whole tracing record.
pub(crate) struct ProgressWriter {
    _guard: MutexGuard<'static, ()>,
    inner: Stderr,
}

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<'a> MakeWriter<'a> for ProgressAwareStderr {
    type Writer = ProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        let guard = acquire_stderr_lock();
        let mut stderr = io::stderr();
        if PROGRESS_ACTIVE.swap(false, Relaxed) {
            let _ = stderr.write_all(b"\r\x1b[2K");
        }
        ProgressWriter {
            _guard: guard,
            inner: stderr,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ProgressLine

struct ProgressLine<W: Write> {
    out: W,
    /// Draw the `\r` counter line (stderr is a terminal, not quiet).
    if_live: bool,
    /// Suppress archive notices as well.
    if_quiet: bool,
    n_visited: u64,
    n_copied: u64,
}

impl ProgressLine<Stderr> {
    fn stderr(quiet: bool) -> Self {
        let stderr = io::stderr();
        let if_live = !quiet && stderr.is_terminal();
        Self::new(stderr, if_live, quiet)
    }
}

impl<W: Write> ProgressLine<W> {
    fn new(out: W, if_live: bool, if_quiet: bool) -> Self {
        Self {
            out,
            if_live,
            if_quiet,
            n_visited: 0,
            n_copied: 0,
        }
    }

    fn redraw(&mut self) {
        if !self.if_live {
            return;
        }
        let _guard = acquire_stderr_lock();
        let _ = write!(
            self.out,
            "\r\x1b[2Kscanned {} file(s), copied {}",
            self.n_visited, self.n_copied
        );
        let _ = self.out.flush();
        PROGRESS_ACTIVE.store(true, Relaxed);
    }

    fn clear(&mut self) {
        let _guard = acquire_stderr_lock();
        self.clear_locked();
    }

    fn clear_locked(&mut self) {
        if self.if_live && PROGRESS_ACTIVE.swap(false, Relaxed) {
            let _ = write!(self.out, "\r\x1b[2K");
            let _ = self.out.flush();
        }
    }

    /// Print one full line above the progress line.
    fn notice(&mut self, line: &str) {
        let _guard = acquire_stderr_lock();
        self.clear_locked();
        let _ = writeln!(self.out, "{line}");
    }

    fn handle(&mut self, event: CopyEvent) {
        match event {
            CopyEvent::FileVisited(_) => {
                self.n_visited += 1;
                self.redraw();
            }
            CopyEvent::FileCopied { .. } => {
                self.n_copied += 1;
                self.redraw();
            }
            CopyEvent::DirectorySkipped(_) => {}
            CopyEvent::Error(message) => {
                self.notice(&format!("error: {message}"));
                self.redraw();
            }
            CopyEvent::ArchiveStarted(path) => {
                if !self.if_quiet {
                    self.notice(&format!("Creating archive {}", path.display()));
                }
            }
            CopyEvent::ArchiveFinished { path, n_entries } => {
                if !self.if_quiet {
                    self.notice(&format!(
                        "Archive written: {} ({n_entries} entries)",
                        path.display()
                    ));
                }
            }
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

/// Render events until the worker drops its sender, forwarding the first
/// interrupt as a cancellation, then collect the result.
pub(crate) fn drive(
    controller: &mut CopyJobController,
    rx: Receiver<CopyEvent>,
    quiet: bool,
) -> Option<Result<ReportCopy, RunError>> {
    let mut progress = ProgressLine::stderr(quiet);
    let mut if_cancel_sent = false;

    loop {
        if !if_cancel_sent && signal::is_cancel_requested() {
            if_cancel_sent = true;
            if controller.cancel() {
                progress.notice("Cancelling... (interrupt again to abort immediately)");
            }
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => progress.handle(event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    progress.clear();
    controller.wait()
}

/// Final message and process exit code for a finished run.
pub(crate) fn render_outcome(result: &Result<ReportCopy, RunError>) -> (String, u8) {
    match result {
        Ok(report) => match report.status() {
            EnumRunStatus::Completed => ("Completed.".to_string(), EXIT_OK),
            EnumRunStatus::CompletedWithErrors => {
                let mut message = "Completed with errors:".to_string();
                for line in report.error_messages() {
                    message.push_str("\n  ");
                    message.push_str(&line);
                }
                (message, EXIT_COMPLETED_WITH_ERRORS)
            }
            EnumRunStatus::Cancelled => ("Cancelled.".to_string(), EXIT_CANCELLED),
        },
        Err(RunError::Validation(l_messages)) => {
            let mut message = "Cannot start:".to_string();
            for line in l_messages {
                message.push_str("\n  ");
                message.push_str(line);
            }
            (message, EXIT_VALIDATION)
        }
        Err(err) => (format!("Error: {err}"), EXIT_COMPLETED_WITH_ERRORS),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use sendkit_io_fs::SpecCopyError;

    use super::*;

    fn render_archive_events(quiet: bool) -> String {
        let mut progress = ProgressLine::new(Vec::new(), false, quiet);
        progress.handle(CopyEvent::ArchiveStarted(PathBuf::from("/out/a.zip")));
        progress.handle(CopyEvent::ArchiveFinished {
            path: PathBuf::from("/out/a.zip"),
            n_entries: 3,
        });
        progress.handle(CopyEvent::Error("boom".to_string()));
        String::from_utf8(progress.out).expect("utf8 output")
    }

    #[test]
    fn archive_notices_follow_quiet_together() {
        assert_eq!(
            render_archive_events(false),
            "Creating archive /out/a.zip\nArchive written: /out/a.zip (3 entries)\nerror: boom\n"
        );
        assert_eq!(render_archive_events(true), "error: boom\n");
    }

    #[test]
    fn non_terminal_output_has_no_progress_line() {
        let mut progress = ProgressLine::new(Vec::new(), false, false);
        progress.handle(CopyEvent::FileVisited(PathBuf::from("/src/a.txt")));
        progress.handle(CopyEvent::FileCopied {
            source: PathBuf::from("/src/a.txt"),
            destination: PathBuf::from("/dst/a.txt"),
        });
        progress.clear();
        assert_eq!(progress.n_copied, 1);
        assert!(progress.out.is_empty());
    }

    #[test]
    fn clean_run_renders_completed() {
        let (message, code) = render_outcome(&Ok(ReportCopy::default()));
        assert_eq!(message, "Completed.");
        assert_eq!(code, EXIT_OK);
    }

    #[test]
    fn errors_are_listed_in_order() {
        let report = ReportCopy {
            errors: vec![
                SpecCopyError {
                    path: PathBuf::from("/a"),
                    exception: "Permission denied: /a".to_string(),
                },
                SpecCopyError {
                    path: PathBuf::from("/b"),
                    exception: "/b: disk full".to_string(),
                },
            ],
            ..ReportCopy::default()
        };
        let (message, code) = render_outcome(&Ok(report));
        assert_eq!(
            message,
            "Completed with errors:\n  Permission denied: /a\n  /b: disk full"
        );
        assert_eq!(code, EXIT_COMPLETED_WITH_ERRORS);
    }

    #[test]
    fn cancellation_wins_over_errors() {
        let report = ReportCopy {
            if_cancelled: true,
            errors: vec![SpecCopyError {
                path: PathBuf::from("/a"),
                exception: "boom".to_string(),
            }],
            ..ReportCopy::default()
        };
        let (message, code) = render_outcome(&Ok(report));
        assert_eq!(message, "Cancelled.");
        assert_eq!(code, EXIT_CANCELLED);
    }

    #[test]
    fn validation_failure_lists_every_message() {
        let result = Err(RunError::Validation(vec![
            "first".to_string(),
            "second".to_string(),
        ]));
        let (message, code) = render_outcome(&result);
        assert_eq!(message, "Cannot start:\n  first\n  second");
        assert_eq!(code, EXIT_VALIDATION);
    }
}
