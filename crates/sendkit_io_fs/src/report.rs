//! Copy outcome model and mutable outcome builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::spec::{EnumRunStatus, SpecCopyError};

/// Aggregate counters and diagnostics for one export run.
#[derive(Debug, Default, Clone)]
pub struct ReportCopy {
    /// Files that passed the attribute and date filters.
    pub cnt_matched: u64,
    /// Files visited in source directories.
    pub cnt_scanned: u64,
    /// Files copied into the destination tree.
    pub cnt_copied: u64,
    /// Files rejected by the attribute or date filters.
    pub cnt_skipped: u64,
    /// Subdirectories pruned as hidden, system, or excluded.
    pub cnt_dirs_skipped: u64,
    /// The walk stopped on a cancellation request.
    pub if_cancelled: bool,
    /// Archive written after the copy, if any.
    pub path_archive: Option<PathBuf>,
    /// Non-fatal warnings collected during traversal.
    pub warnings: Vec<String>,
    /// Per-entry failures, in the order they happened.
    pub errors: Vec<SpecCopyError>,
}

impl ReportCopy {
    /// Number of collected hard errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// `true` iff nothing failed and the run was not cancelled.
    pub fn is_successful(&self) -> bool {
        self.errors.is_empty() && !self.if_cancelled
    }

    /// Terminal status; cancellation wins over recorded errors.
    pub fn status(&self) -> EnumRunStatus {
        if self.if_cancelled {
            EnumRunStatus::Cancelled
        } else if self.errors.is_empty() {
            EnumRunStatus::Completed
        } else {
            EnumRunStatus::CompletedWithErrors
        }
    }

    /// Error texts in recorded order.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.exception.clone()).collect()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_matched".to_string(), self.cnt_matched);
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_copied".to_string(), self.cnt_copied);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_dirs_skipped".to_string(), self.cnt_dirs_skipped);
        dict_counts.insert("cnt_errors".to_string(), self.error_count() as u64);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} scanned={} matched={} copied={} skipped={} dirs_skipped={} errors={} warnings={}",
            dict_counts["cnt_scanned"],
            dict_counts["cnt_matched"],
            dict_counts["cnt_copied"],
            dict_counts["cnt_skipped"],
            dict_counts["cnt_dirs_skipped"],
            dict_counts["cnt_errors"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[COPY]"))
    }
}

/// Mutable accumulator for copy statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportCopyBuilder {
    /// See [`ReportCopy::cnt_matched`].
    pub cnt_matched: u64,
    /// See [`ReportCopy::cnt_scanned`].
    pub cnt_scanned: u64,
    /// See [`ReportCopy::cnt_copied`].
    pub cnt_copied: u64,
    /// See [`ReportCopy::cnt_skipped`].
    pub cnt_skipped: u64,
    /// See [`ReportCopy::cnt_dirs_skipped`].
    pub cnt_dirs_skipped: u64,
    /// See [`ReportCopy::if_cancelled`].
    pub if_cancelled: bool,
    /// See [`ReportCopy::errors`].
    pub errors: Vec<SpecCopyError>,
    /// See [`ReportCopy::warnings`].
    pub warnings: Vec<String>,
}

impl ReportCopyBuilder {
    pub fn add_matched(&mut self) {
        self.cnt_matched += 1;
    }

    pub fn add_scanned(&mut self) {
        self.cnt_scanned += 1;
    }

    pub fn add_copied(&mut self) {
        self.cnt_copied += 1;
    }

    pub fn add_skipped(&mut self) {
        self.cnt_skipped += 1;
    }

    pub fn add_dir_skipped(&mut self) {
        self.cnt_dirs_skipped += 1;
    }

    pub fn mark_cancelled(&mut self) {
        self.if_cancelled = true;
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Add one path-scoped error.
    pub fn add_error(&mut self, path: PathBuf, exception: String) {
        self.errors.push(SpecCopyError { path, exception });
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportCopy {
        ReportCopy {
            cnt_matched: self.cnt_matched,
            cnt_scanned: self.cnt_scanned,
            cnt_copied: self.cnt_copied,
            cnt_skipped: self.cnt_skipped,
            cnt_dirs_skipped: self.cnt_dirs_skipped,
            if_cancelled: self.if_cancelled,
            path_archive: None,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}
