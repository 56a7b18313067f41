//! Date-filtered tree traversal and copy.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::event::{CopyEvent, ProgressSink};
use crate::report::{ReportCopy, ReportCopyBuilder};
use crate::spec::{RunError, SpecWalkOptions};
use crate::util::{
    SpecDirFilter, copy_dir_attributes, copy_file_with_metadata, derive_modified_date,
    describe_io_error, is_date_within_range, is_hidden_or_system, validate_destination_file,
};

#[derive(Debug, Clone)]
struct SpecDirEntry {
    path_dir_src_sub: PathBuf,
    name_dir: String,
}

#[derive(Debug, Clone)]
struct SpecFileEntry {
    path_file_src: PathBuf,
    name_file: String,
}

/// Failure that abandons one directory (and everything beneath it).
#[derive(Debug, Error)]
enum WalkError {
    #[error("failed to read directory {}", path.display())]
    ReadDir { path: PathBuf, source: io::Error },
    #[error("failed to create destination directory {}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
}

impl WalkError {
    fn path(&self) -> &Path {
        match self {
            Self::ReadDir { path, .. } | Self::CreateDir { path, .. } => path,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::ReadDir { path, source } | Self::CreateDir { path, source } => {
                describe_io_error(path, source)
            }
        }
    }
}

struct SpecWalkContext<'a> {
    date_from: NaiveDate,
    date_to: NaiveDate,
    spec_dir_filter: SpecDirFilter,
    cancel: &'a CancelToken,
    progress: &'a dyn ProgressSink,
    builder_cp_report: ReportCopyBuilder,
    set_visited_dirs: HashSet<(u64, u64)>,
}

impl SpecWalkContext<'_> {
    fn record_error(&mut self, path: PathBuf, message: String) {
        warn!(path = %path.display(), error = %message, "entry failed");
        self.progress.emit(CopyEvent::Error(message.clone()));
        self.builder_cp_report.add_error(path, message);
    }
}

/// Mirror every file of `dir_source` last modified within
/// `[date_from, date_to]` into `dir_destination`.
///
/// Traversal is sequential, depth-first and pre-order: at each level the
/// files are handled (sorted by name) before the subdirectories (sorted by
/// name). Hidden and system entries are skipped; so are subdirectories whose
/// leaf name is excluded by [`SpecWalkOptions`]. Destination directories are
/// only created once a file needs to land in them.
///
/// `cancel` is checked each time a directory is entered. A cancelled run
/// keeps whatever was copied so far and returns a report flagged
/// `if_cancelled`; this is not an error.
///
/// Per-entry failures are recorded in the report and the walk moves on to
/// the next sibling. [`RunError`] is returned only for invalid exclusion
/// patterns, before anything is read.
pub fn walk_tree<P, Q>(
    dir_source: P,
    dir_destination: Q,
    date_from: NaiveDate,
    date_to: NaiveDate,
    spec_walk_options: &SpecWalkOptions,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> Result<ReportCopy, RunError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_dir_src = dir_source.as_ref();
    let path_dir_dst = dir_destination.as_ref();
    let spec_dir_filter = SpecDirFilter::from_options(spec_walk_options)?;

    let mut spec_walk_ctx = SpecWalkContext {
        date_from,
        date_to,
        spec_dir_filter,
        cancel,
        progress,
        builder_cp_report: ReportCopyBuilder::default(),
        set_visited_dirs: HashSet::new(),
    };

    if let Err(e) = walk_directory(path_dir_src, path_dir_dst, &mut spec_walk_ctx) {
        spec_walk_ctx.record_error(e.path().to_path_buf(), e.describe());
    }

    let report = spec_walk_ctx.builder_cp_report.build();
    info!(
        source = %path_dir_src.display(),
        destination = %path_dir_dst.display(),
        cancelled = report.if_cancelled,
        "{report}"
    );
    Ok(report)
}

fn walk_directory(
    path_dir_src: &Path,
    path_dir_dst: &Path,
    spec_walk_ctx: &mut SpecWalkContext<'_>,
) -> Result<(), WalkError> {
    if spec_walk_ctx.cancel.is_cancelled() {
        debug!(path = %path_dir_src.display(), "cancelled before entering directory");
        spec_walk_ctx.builder_cp_report.mark_cancelled();
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        if let Ok(stat_root) = fs::metadata(path_dir_src)
            && !spec_walk_ctx
                .set_visited_dirs
                .insert((stat_root.dev(), stat_root.ino()))
        {
            spec_walk_ctx
                .builder_cp_report
                .add_warning(format!("Symlink loop detected: {}", path_dir_src.display()));
            return Ok(());
        }
    }

    let iter_entries = fs::read_dir(path_dir_src).map_err(|source| WalkError::ReadDir {
        path: path_dir_src.to_path_buf(),
        source,
    })?;

    let mut l_dirs: Vec<SpecDirEntry> = Vec::new();
    let mut l_files: Vec<SpecFileEntry> = Vec::new();

    for _entry_res in iter_entries {
        let entry = match _entry_res {
            Ok(v) => v,
            Err(e) => {
                spec_walk_ctx.record_error(
                    path_dir_src.to_path_buf(),
                    describe_io_error(path_dir_src, &e),
                );
                continue;
            }
        };

        let path_entry = entry.path();
        let c_name = entry.file_name().to_string_lossy().to_string();
        let cfg_file_type = match entry.file_type() {
            Ok(v) => v,
            Err(e) => {
                let message = describe_io_error(&path_entry, &e);
                spec_walk_ctx.record_error(path_entry, message);
                continue;
            }
        };

        let (b_is_dir, b_is_file) = if cfg_file_type.is_symlink() {
            match fs::metadata(&path_entry) {
                Ok(meta_target) => (meta_target.is_dir(), meta_target.is_file()),
                Err(_) => {
                    spec_walk_ctx
                        .builder_cp_report
                        .add_warning(format!("Broken symlink skipped: {}", path_entry.display()));
                    continue;
                }
            }
        } else {
            (cfg_file_type.is_dir(), cfg_file_type.is_file())
        };

        if b_is_dir {
            l_dirs.push(SpecDirEntry {
                path_dir_src_sub: path_entry,
                name_dir: c_name,
            });
        } else if b_is_file {
            l_files.push(SpecFileEntry {
                path_file_src: path_entry,
                name_file: c_name,
            });
        } else {
            spec_walk_ctx
                .builder_cp_report
                .add_warning(format!("Special file skipped: {}", path_entry.display()));
        }
    }

    l_dirs.sort_by(|a, b| a.name_dir.cmp(&b.name_dir));
    l_files.sort_by(|a, b| a.name_file.cmp(&b.name_file));

    let mut b_dst_ready = false;
    for _file_entry in l_files {
        handle_file_entry(
            _file_entry,
            path_dir_src,
            path_dir_dst,
            &mut b_dst_ready,
            spec_walk_ctx,
        )?;
    }

    for _dir_entry in l_dirs {
        if !should_descend(&_dir_entry, spec_walk_ctx) {
            continue;
        }
        let path_dir_dst_sub = path_dir_dst.join(&_dir_entry.name_dir);
        if let Err(e) = walk_directory(
            &_dir_entry.path_dir_src_sub,
            &path_dir_dst_sub,
            spec_walk_ctx,
        ) {
            spec_walk_ctx.record_error(e.path().to_path_buf(), e.describe());
        }
    }

    Ok(())
}

fn should_descend(spec_dir_entry: &SpecDirEntry, spec_walk_ctx: &mut SpecWalkContext<'_>) -> bool {
    let path_dir = &spec_dir_entry.path_dir_src_sub;
    let meta_dir = match fs::metadata(path_dir) {
        Ok(v) => v,
        Err(e) => {
            spec_walk_ctx.record_error(path_dir.clone(), describe_io_error(path_dir, &e));
            return false;
        }
    };

    if is_hidden_or_system(path_dir, &meta_dir)
        || spec_walk_ctx
            .spec_dir_filter
            .is_excluded(&spec_dir_entry.name_dir)
    {
        debug!(path = %path_dir.display(), "directory skipped");
        spec_walk_ctx.builder_cp_report.add_dir_skipped();
        spec_walk_ctx
            .progress
            .emit(CopyEvent::DirectorySkipped(path_dir.clone()));
        return false;
    }
    true
}

/// Returns `Err` only when the destination directory cannot be prepared,
/// which abandons the rest of the current directory.
fn handle_file_entry(
    spec_file_entry: SpecFileEntry,
    path_dir_src: &Path,
    path_dir_dst: &Path,
    b_dst_ready: &mut bool,
    spec_walk_ctx: &mut SpecWalkContext<'_>,
) -> Result<(), WalkError> {
    let path_file_src = spec_file_entry.path_file_src;
    spec_walk_ctx
        .progress
        .emit(CopyEvent::FileVisited(path_file_src.clone()));
    spec_walk_ctx.builder_cp_report.add_scanned();

    let meta_file_src = match fs::metadata(&path_file_src) {
        Ok(v) => v,
        Err(e) => {
            let message = describe_io_error(&path_file_src, &e);
            spec_walk_ctx.record_error(path_file_src, message);
            return Ok(());
        }
    };

    if is_hidden_or_system(&path_file_src, &meta_file_src) {
        spec_walk_ctx.builder_cp_report.add_skipped();
        return Ok(());
    }

    let date_modified = match derive_modified_date(&meta_file_src) {
        Ok(v) => v,
        Err(e) => {
            let message = describe_io_error(&path_file_src, &e);
            spec_walk_ctx.record_error(path_file_src, message);
            return Ok(());
        }
    };
    if !is_date_within_range(
        date_modified,
        spec_walk_ctx.date_from,
        spec_walk_ctx.date_to,
    ) {
        spec_walk_ctx.builder_cp_report.add_skipped();
        return Ok(());
    }
    spec_walk_ctx.builder_cp_report.add_matched();

    if !*b_dst_ready {
        ensure_destination_dir(path_dir_src, path_dir_dst)?;
        *b_dst_ready = true;
    }

    let path_file_dst = path_dir_dst.join(&spec_file_entry.name_file);
    if let Err(message) = validate_destination_file(&path_file_dst) {
        spec_walk_ctx.record_error(path_file_dst, message);
        return Ok(());
    }
    match copy_file_with_metadata(&path_file_src, &path_file_dst) {
        Ok(()) => {
            debug!(
                source = %path_file_src.display(),
                destination = %path_file_dst.display(),
                "copied file"
            );
            spec_walk_ctx.builder_cp_report.add_copied();
            spec_walk_ctx.progress.emit(CopyEvent::FileCopied {
                source: path_file_src,
                destination: path_file_dst,
            });
        }
        Err(e) => {
            let message = describe_io_error(&path_file_dst, &e);
            spec_walk_ctx.record_error(path_file_dst, message);
        }
    }
    Ok(())
}

fn ensure_destination_dir(path_dir_src: &Path, path_dir_dst: &Path) -> Result<(), WalkError> {
    if path_dir_dst.is_dir() {
        return Ok(());
    }
    let map_create_err = |source| WalkError::CreateDir {
        path: path_dir_dst.to_path_buf(),
        source,
    };
    fs::create_dir_all(path_dir_dst).map_err(map_create_err)?;
    copy_dir_attributes(path_dir_src, path_dir_dst).map_err(map_create_err)
}
