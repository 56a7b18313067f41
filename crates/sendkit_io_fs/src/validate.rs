//! Pre-flight checks run before anything on disk is touched.

use std::fs;
use std::path::Path;

use crate::spec::{SpecCopyRequest, SpecWalkOptions};
use crate::util::{SpecDirFilter, derive_leaf_name, is_hidden_or_system, is_overlap};

pub const C_MSG_PATHS_REQUIRED: &str = "Source and destination folders are required.";
pub const C_MSG_SOURCE_MISSING: &str = "The source folder does not exist.";
pub const C_MSG_SOURCE_UNUSABLE: &str = "The source folder cannot be used.";
pub const C_MSG_DESTINATION_MISSING: &str = "The destination folder does not exist.";
pub const C_MSG_DESTINATION_UNUSABLE: &str = "The destination folder cannot be used.";
pub const C_MSG_DATE_ORDER: &str = "The date range must satisfy From <= To.";
pub const C_MSG_PASSWORD_REQUIRED: &str = "Enter a password.";
pub const C_MSG_OVERLAP: &str = "The source and destination folders must not contain each other.";

/// Run every pre-flight check and return all violations, in check order.
///
/// An empty list means the request may run. No check short-circuits another,
/// so a request with several problems reports all of them at once.
pub fn validate_request(
    spec_cp_request: &SpecCopyRequest,
    spec_walk_options: &SpecWalkOptions,
) -> Vec<String> {
    // Bad extra patterns surface from the walk itself; leaf names still count.
    let spec_dir_filter =
        SpecDirFilter::from_options(spec_walk_options).unwrap_or_else(|_| SpecDirFilter {
            dirs_excluded: spec_walk_options.dirs_excluded.clone(),
            patterns_exclude_dirs: None,
        });

    let path_src = spec_cp_request.dir_source.as_path();
    let path_dst = spec_cp_request.dir_destination.as_path();
    let b_src_given = !path_src.as_os_str().is_empty();
    let b_dst_given = !path_dst.as_os_str().is_empty();

    let mut l_errors = Vec::new();

    if !b_src_given || !b_dst_given {
        l_errors.push(C_MSG_PATHS_REQUIRED.to_string());
    }
    if !(b_src_given && path_src.is_dir()) {
        l_errors.push(C_MSG_SOURCE_MISSING.to_string());
    }
    if !is_usable_root(path_src, &spec_dir_filter) {
        l_errors.push(C_MSG_SOURCE_UNUSABLE.to_string());
    }
    if !(b_dst_given && path_dst.is_dir()) {
        l_errors.push(C_MSG_DESTINATION_MISSING.to_string());
    }
    if !is_usable_root(path_dst, &spec_dir_filter) {
        l_errors.push(C_MSG_DESTINATION_UNUSABLE.to_string());
    }
    if spec_cp_request.date_from > spec_cp_request.date_to {
        l_errors.push(C_MSG_DATE_ORDER.to_string());
    }
    if spec_cp_request.if_compress
        && spec_cp_request.if_password_protect
        && spec_cp_request.password.is_empty()
    {
        l_errors.push(C_MSG_PASSWORD_REQUIRED.to_string());
    }
    if path_src.is_dir() && path_dst.is_dir() && is_overlap(path_src, path_dst) {
        l_errors.push(C_MSG_OVERLAP.to_string());
    }

    l_errors
}

/// Same leaf-name and attribute rules the walk applies to subdirectories.
/// Paths that cannot be inspected are judged on their name alone.
fn is_usable_root(path: &Path, spec_dir_filter: &SpecDirFilter) -> bool {
    if derive_leaf_name(path).is_some_and(|n| spec_dir_filter.is_excluded(&n)) {
        return false;
    }
    match fs::metadata(path) {
        Ok(meta) => !is_hidden_or_system(path, &meta),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::NaiveDate;

    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn dirs() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        std::fs::create_dir_all(&src).expect("mkdir src");
        std::fs::create_dir_all(&dst).expect("mkdir dst");
        (tmp, src, dst)
    }

    #[test]
    fn valid_request_passes() {
        let (_tmp, src, dst) = dirs();
        let request = SpecCopyRequest::new(&src, &dst, ymd(2024, 1, 1), ymd(2024, 1, 1));
        assert!(validate_request(&request, &SpecWalkOptions::default()).is_empty());
    }

    #[test]
    fn reversed_dates_rejected() {
        let (_tmp, src, dst) = dirs();
        let request = SpecCopyRequest::new(&src, &dst, ymd(2024, 2, 1), ymd(2024, 1, 1));
        assert_eq!(
            validate_request(&request, &SpecWalkOptions::default()),
            vec![C_MSG_DATE_ORDER.to_string()]
        );
    }

    #[test]
    fn all_violations_are_reported_together() {
        let request = SpecCopyRequest {
            if_compress: true,
            if_password_protect: true,
            ..SpecCopyRequest::new("", "", ymd(2024, 2, 1), ymd(2024, 1, 1))
        };
        let l_errors = validate_request(&request, &SpecWalkOptions::default());
        assert_eq!(
            l_errors,
            vec![
                C_MSG_PATHS_REQUIRED.to_string(),
                C_MSG_SOURCE_MISSING.to_string(),
                C_MSG_DESTINATION_MISSING.to_string(),
                C_MSG_DATE_ORDER.to_string(),
                C_MSG_PASSWORD_REQUIRED.to_string(),
            ]
        );
    }

    #[test]
    fn password_only_required_when_compressing_with_protection() {
        let (_tmp, src, dst) = dirs();
        let base = SpecCopyRequest::new(&src, &dst, ymd(2024, 1, 1), ymd(2024, 1, 2));

        let protect_without_zip = SpecCopyRequest {
            if_password_protect: true,
            ..base.clone()
        };
        assert!(validate_request(&protect_without_zip, &SpecWalkOptions::default()).is_empty());

        let zip_with_password = SpecCopyRequest {
            if_compress: true,
            if_password_protect: true,
            password: "pw".to_string(),
            ..base
        };
        assert!(validate_request(&zip_with_password, &SpecWalkOptions::default()).is_empty());
    }

    #[test]
    fn excluded_leaf_names_are_unusable_roots() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("bin");
        let dst = tmp.path().join("Windows");
        std::fs::create_dir_all(&src).expect("mkdir src");
        std::fs::create_dir_all(&dst).expect("mkdir dst");

        let request = SpecCopyRequest::new(&src, &dst, ymd(2024, 1, 1), ymd(2024, 1, 1));
        assert_eq!(
            validate_request(&request, &SpecWalkOptions::default()),
            vec![
                C_MSG_SOURCE_UNUSABLE.to_string(),
                C_MSG_DESTINATION_UNUSABLE.to_string(),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn hidden_roots_are_unusable() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join(".cache");
        let dst = tmp.path().join("dst");
        std::fs::create_dir_all(&src).expect("mkdir src");
        std::fs::create_dir_all(&dst).expect("mkdir dst");

        let request = SpecCopyRequest::new(&src, &dst, ymd(2024, 1, 1), ymd(2024, 1, 1));
        assert_eq!(
            validate_request(&request, &SpecWalkOptions::default()),
            vec![C_MSG_SOURCE_UNUSABLE.to_string()]
        );
    }

    #[test]
    fn nested_destination_rejected() {
        let (_tmp, src, _dst) = dirs();
        let nested = src.join("out");
        std::fs::create_dir_all(&nested).expect("mkdir nested");

        let request = SpecCopyRequest::new(&src, &nested, ymd(2024, 1, 1), ymd(2024, 1, 1));
        assert_eq!(
            validate_request(&request, &SpecWalkOptions::default()),
            vec![C_MSG_OVERLAP.to_string()]
        );
    }
}
