//! Copy request models, walk/archive options, and top-level error types.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Directory leaf names never descended into (and never accepted as roots).
pub const TUP_DIRS_EXCLUDED_DEFAULT: [&str; 5] = [
    "bin",
    "obj",
    "Program Files",
    "Program Files (x86)",
    "Windows",
];

/// Default archive folder created next to the destination directory.
pub const C_ARCHIVE_FOLDER_DEFAULT: &str = "sending_source";
/// Default archive file name prefix.
pub const C_ARCHIVE_PREFIX_DEFAULT: &str = "source";

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Pattern matching mode for extra directory exclusions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumCopyPatternMode {
    /// Shell-like wildcards (`*`, `?`, character classes).
    #[default]
    Glob,
    /// Regular expression pattern.
    Regex,
    /// Exact string match.
    Literal,
}

/// Terminal state of one run, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumRunStatus {
    /// Finished with no recorded errors.
    Completed,
    /// Finished, but at least one entry failed.
    CompletedWithErrors,
    /// Stopped by a cancellation request.
    Cancelled,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// One export request, as collected from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCopyRequest {
    /// Directory tree to read from.
    pub dir_source: PathBuf,
    /// Directory the filtered tree is mirrored into.
    pub dir_destination: PathBuf,
    /// First accepted modification date (inclusive).
    pub date_from: NaiveDate,
    /// Last accepted modification date (inclusive).
    pub date_to: NaiveDate,
    /// Zip the destination tree after a clean copy.
    pub if_compress: bool,
    /// Encrypt archive entries with `password`.
    pub if_password_protect: bool,
    /// Archive password; only read when both flags above are set.
    pub password: String,
}

impl SpecCopyRequest {
    /// Build a request without compression.
    pub fn new(
        dir_source: impl Into<PathBuf>,
        dir_destination: impl Into<PathBuf>,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Self {
        Self {
            dir_source: dir_source.into(),
            dir_destination: dir_destination.into(),
            date_from,
            date_to,
            if_compress: false,
            if_password_protect: false,
            password: String::new(),
        }
    }

    /// Password to encrypt with, if protection applies to this request.
    pub fn archive_password(&self) -> Option<&str> {
        (self.if_compress && self.if_password_protect && !self.password.is_empty())
            .then_some(self.password.as_str())
    }
}

/// Directory filter options for the walk.
#[derive(Debug, Clone)]
pub struct SpecWalkOptions {
    /// Exact leaf names excluded from traversal.
    pub dirs_excluded: Vec<String>,
    /// Extra exclusion patterns applied to directory leaf names.
    pub patterns_exclude_dirs: Option<Vec<String>>,
    /// Interpretation of `patterns_exclude_dirs`.
    pub rule_pattern: EnumCopyPatternMode,
}

impl Default for SpecWalkOptions {
    fn default() -> Self {
        Self {
            dirs_excluded: TUP_DIRS_EXCLUDED_DEFAULT
                .iter()
                .map(|name| name.to_string())
                .collect(),
            patterns_exclude_dirs: None,
            rule_pattern: EnumCopyPatternMode::Glob,
        }
    }
}

/// Archive naming options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecArchiveOptions {
    /// Folder created under the destination's parent.
    pub archive_folder: String,
    /// File name prefix, joined to the date stamp with `_`.
    pub archive_prefix: String,
    /// Nest the archive in an extra `<YYYYMMDD>` folder.
    pub if_date_subfolder: bool,
}

impl Default for SpecArchiveOptions {
    fn default() -> Self {
        Self {
            archive_folder: C_ARCHIVE_FOLDER_DEFAULT.to_string(),
            archive_prefix: C_ARCHIVE_PREFIX_DEFAULT.to_string(),
            if_date_subfolder: false,
        }
    }
}

/// One copy failure item with path + error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCopyError {
    /// Failed source or destination path.
    pub path: PathBuf,
    /// User-facing error text.
    pub exception: String,
}

/// "Top-level call failed" errors (pre-flight stage). Nothing on disk has
/// been touched when one of these is returned.
#[derive(Debug, Error)]
pub enum RunError {
    /// One or more pre-flight checks failed; every violation is listed.
    #[error("invalid copy request: {}", .0.join("; "))]
    Validation(Vec<String>),
    /// Invalid extra exclusion pattern.
    #[error("{0}")]
    InvalidPattern(String),
    /// The background worker thread could not be started.
    #[error("failed to start copy worker")]
    WorkerSpawn(#[source] std::io::Error),
    /// The background worker thread panicked.
    #[error("copy worker stopped unexpectedly")]
    WorkerPanicked,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
