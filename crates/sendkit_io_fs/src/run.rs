//! One full export: validate, walk, then optionally archive.

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use crate::archive::{create_archive, derive_archive_path};
use crate::cancel::CancelToken;
use crate::event::{CopyEvent, ProgressSink};
use crate::report::ReportCopy;
use crate::spec::{
    RunError, SpecArchiveOptions, SpecCopyError, SpecCopyRequest, SpecWalkOptions,
};
use crate::validate::validate_request;
use crate::walk::walk_tree;

/// Run `spec_cp_request` with today's local date stamped on the archive.
///
/// See [`run_copy_job_on`].
pub fn run_copy_job(
    spec_cp_request: &SpecCopyRequest,
    spec_walk_options: &SpecWalkOptions,
    spec_archive_options: &SpecArchiveOptions,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> Result<ReportCopy, RunError> {
    run_copy_job_on(
        spec_cp_request,
        spec_walk_options,
        spec_archive_options,
        cancel,
        progress,
        Local::now().date_naive(),
    )
}

/// Validate, copy, and (after a clean copy) archive.
///
/// Returns [`RunError::Validation`] with every failed check when the request
/// is rejected; nothing is created in that case. Otherwise the report holds
/// the copy errors, the cancellation flag, and the archive path or archive
/// error. The archive is only attempted when compression was requested, the
/// walk recorded no errors, and it was not cancelled.
pub fn run_copy_job_on(
    spec_cp_request: &SpecCopyRequest,
    spec_walk_options: &SpecWalkOptions,
    spec_archive_options: &SpecArchiveOptions,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
    date_today: NaiveDate,
) -> Result<ReportCopy, RunError> {
    let l_errors = validate_request(spec_cp_request, spec_walk_options);
    if !l_errors.is_empty() {
        warn!(count = l_errors.len(), "copy request rejected");
        return Err(RunError::Validation(l_errors));
    }

    info!(
        source = %spec_cp_request.dir_source.display(),
        destination = %spec_cp_request.dir_destination.display(),
        date_from = %spec_cp_request.date_from,
        date_to = %spec_cp_request.date_to,
        compress = spec_cp_request.if_compress,
        "copy started"
    );
    let mut report = walk_tree(
        &spec_cp_request.dir_source,
        &spec_cp_request.dir_destination,
        spec_cp_request.date_from,
        spec_cp_request.date_to,
        spec_walk_options,
        cancel,
        progress,
    )?;

    if !spec_cp_request.if_compress || !report.is_successful() {
        return Ok(report);
    }

    let res_archive = derive_archive_path(
        &spec_cp_request.dir_destination,
        spec_archive_options,
        date_today,
    )
    .and_then(|path_archive| {
        progress.emit(CopyEvent::ArchiveStarted(path_archive.clone()));
        let n_entries = create_archive(
            &spec_cp_request.dir_destination,
            &path_archive,
            spec_cp_request.archive_password(),
        )?;
        Ok((path_archive, n_entries))
    });

    match res_archive {
        Ok((path_archive, n_entries)) => {
            progress.emit(CopyEvent::ArchiveFinished {
                path: path_archive.clone(),
                n_entries,
            });
            report.path_archive = Some(path_archive);
        }
        Err(e) => {
            let message = e.to_string();
            warn!(error = %message, "archive failed");
            progress.emit(CopyEvent::Error(message.clone()));
            report.errors.push(SpecCopyError {
                path: spec_cp_request.dir_destination.clone(),
                exception: message,
            });
        }
    }
    Ok(report)
}
