//! `sendkit_io_fs` v1:
//! Date-filtered source tree export engine.
//!
//! Modules:
//! - `walk`     : recursive date/attribute-filtered copy
//! - `validate` : pre-flight request checks
//! - `archive`  : zip packaging of the exported tree
//! - `run`      : validate -> walk -> archive orchestration
//! - `job`      : background worker with one-run-at-a-time control
//! - `spec`     : enums/options/errors
//! - `report`   : run outcome model
//! - `event`    : progress notifications
//! - `cancel`   : cooperative cancellation token
//! - `util`     : shared helper functions

pub mod archive;
pub mod cancel;
pub mod event;
pub mod job;
pub mod report;
pub mod run;
pub mod spec;
mod util;
pub mod validate;
pub mod walk;

pub use archive::{ArchiveError, create_archive, derive_archive_path};
pub use cancel::CancelToken;
pub use event::{CopyEvent, NoopProgress, ProgressSink};
pub use job::{CopyJobController, EnumTrigger};
pub use report::{ReportCopy, ReportCopyBuilder};
pub use run::{run_copy_job, run_copy_job_on};
pub use spec::{
    C_ARCHIVE_FOLDER_DEFAULT, C_ARCHIVE_PREFIX_DEFAULT, EnumCopyPatternMode, EnumRunStatus,
    RunError, SpecArchiveOptions, SpecCopyError, SpecCopyRequest, SpecWalkOptions,
    TUP_DIRS_EXCLUDED_DEFAULT,
};
pub use validate::validate_request;
pub use walk::walk_tree;
