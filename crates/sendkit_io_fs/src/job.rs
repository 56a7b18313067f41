//! Background execution with one-run-at-a-time semantics.

use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::event::ProgressSink;
use crate::report::ReportCopy;
use crate::run::run_copy_job;
use crate::spec::{RunError, SpecArchiveOptions, SpecCopyRequest, SpecWalkOptions};

/// What a [`CopyJobController::trigger`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumTrigger {
    /// A new run was started on a worker thread.
    Started,
    /// A run was already in flight; it has been asked to stop instead.
    CancelRequested,
}

struct SpecRunningJob {
    cancel: CancelToken,
    handle: JoinHandle<Result<ReportCopy, RunError>>,
}

/// Owns at most one running export.
///
/// The trigger doubles as the stop button: calling it while a run is in
/// flight cancels that run rather than starting another.
pub struct CopyJobController {
    spec_walk_options: SpecWalkOptions,
    spec_archive_options: SpecArchiveOptions,
    job_running: Option<SpecRunningJob>,
}

impl CopyJobController {
    pub fn new(spec_walk_options: SpecWalkOptions, spec_archive_options: SpecArchiveOptions) -> Self {
        Self {
            spec_walk_options,
            spec_archive_options,
            job_running: None,
        }
    }

    /// A run has been started and its worker has not exited yet.
    pub fn is_running(&self) -> bool {
        self.job_running
            .as_ref()
            .is_some_and(|job| !job.handle.is_finished())
    }

    /// Start `spec_cp_request`, or cancel the run already in flight.
    ///
    /// Progress goes to `progress` from the worker thread; it is dropped when
    /// the run ends, which closes channel-based sinks.
    pub fn trigger<S>(
        &mut self,
        spec_cp_request: SpecCopyRequest,
        progress: S,
    ) -> Result<EnumTrigger, RunError>
    where
        S: ProgressSink + Send + 'static,
    {
        if let Some(job) = &self.job_running {
            if !job.handle.is_finished() {
                info!("copy in flight; cancelling");
                job.cancel.cancel();
                return Ok(EnumTrigger::CancelRequested);
            }
            // Finished but never collected.
            if let Some(job) = self.job_running.take() {
                debug!("discarding result of uncollected run");
                let _ = job.handle.join();
            }
        }

        let cancel = CancelToken::new();
        let cancel_worker = cancel.clone();
        let spec_walk_options = self.spec_walk_options.clone();
        let spec_archive_options = self.spec_archive_options.clone();
        let handle = thread::Builder::new()
            .name("sendkit-copy".to_string())
            .spawn(move || {
                run_copy_job(
                    &spec_cp_request,
                    &spec_walk_options,
                    &spec_archive_options,
                    &cancel_worker,
                    &progress,
                )
            })
            .map_err(RunError::WorkerSpawn)?;

        self.job_running = Some(SpecRunningJob { cancel, handle });
        Ok(EnumTrigger::Started)
    }

    /// Ask the in-flight run to stop. Returns `false` when nothing is running.
    pub fn cancel(&self) -> bool {
        match &self.job_running {
            Some(job) if !job.handle.is_finished() => {
                job.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Block until the current run ends and hand back its result. `None`
    /// when no run was started since the last collection.
    pub fn wait(&mut self) -> Option<Result<ReportCopy, RunError>> {
        let job = self.job_running.take()?;
        Some(job.handle.join().unwrap_or(Err(RunError::WorkerPanicked)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver};

    use chrono::Local;

    use super::{CopyJobController, EnumTrigger};
    use crate::event::{CopyEvent, ProgressSink};
    use crate::spec::{
        EnumRunStatus, RunError, SpecArchiveOptions, SpecCopyRequest, SpecWalkOptions,
    };

    /// Blocks the worker on the first event until the sender side is dropped.
    struct GateSink {
        gate: Receiver<()>,
    }

    impl ProgressSink for GateSink {
        fn emit(&self, _event: CopyEvent) {
            let _ = self.gate.recv();
        }
    }

    fn controller() -> CopyJobController {
        CopyJobController::new(SpecWalkOptions::default(), SpecArchiveOptions::default())
    }

    #[test]
    fn second_trigger_cancels_instead_of_starting() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        std::fs::create_dir_all(src.join("sub")).expect("mkdir src");
        std::fs::create_dir_all(&dst).expect("mkdir dst");
        std::fs::write(src.join("a.txt"), "a").expect("write a");
        std::fs::write(src.join("sub/b.txt"), "b").expect("write b");
        let today = Local::now().date_naive();
        let request = SpecCopyRequest::new(&src, &dst, today, today);

        let (tx_gate, rx_gate) = mpsc::channel::<()>();
        let mut controller = controller();
        let first = controller
            .trigger(request.clone(), GateSink { gate: rx_gate })
            .expect("start");
        assert_eq!(first, EnumTrigger::Started);
        assert!(controller.is_running());

        let (tx_unused, _rx_unused) = mpsc::channel::<CopyEvent>();
        let second = controller.trigger(request, tx_unused).expect("trigger");
        assert_eq!(second, EnumTrigger::CancelRequested);

        drop(tx_gate);
        let report = controller.wait().expect("run result").expect("run ok");
        assert_eq!(report.status(), EnumRunStatus::Cancelled);
        assert!(dst.join("a.txt").exists());
        assert!(!dst.join("sub").exists());
        assert!(controller.wait().is_none());
    }

    #[test]
    fn events_flow_over_channel_until_run_ends() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        std::fs::create_dir_all(&src).expect("mkdir src");
        std::fs::create_dir_all(&dst).expect("mkdir dst");
        std::fs::write(src.join("a.txt"), "a").expect("write a");
        let today = Local::now().date_naive();

        let (tx, rx) = mpsc::channel::<CopyEvent>();
        let mut controller = controller();
        controller
            .trigger(SpecCopyRequest::new(&src, &dst, today, today), tx)
            .expect("start");

        let events: Vec<CopyEvent> = rx.iter().collect();
        assert!(matches!(events.first(), Some(CopyEvent::FileVisited(_))));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, CopyEvent::FileCopied { .. }))
        );

        let report = controller.wait().expect("run result").expect("run ok");
        assert!(report.is_successful());
        assert!(!controller.cancel());
    }

    #[test]
    fn validation_errors_come_back_through_wait() {
        let today = Local::now().date_naive();
        let (tx, _rx) = mpsc::channel::<CopyEvent>();
        let mut controller = controller();
        controller
            .trigger(SpecCopyRequest::new("", "", today, today), tx)
            .expect("start");

        let err = controller
            .wait()
            .expect("run result")
            .expect_err("must be rejected");
        assert!(matches!(err, RunError::Validation(_)));
    }
}
