use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::spec::{EnumCopyPatternMode, RunError, SpecWalkOptions};

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

#[derive(Debug, Clone)]
pub(crate) enum TypeCopyPatternSeq {
    Literal(Vec<String>),
    Glob(Vec<GlobMatcher>),
    Regex(Vec<Regex>),
}

/// Compiled directory exclusion rules.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpecDirFilter {
    pub(crate) dirs_excluded: Vec<String>,
    pub(crate) patterns_exclude_dirs: Option<TypeCopyPatternSeq>,
}

impl SpecDirFilter {
    pub(crate) fn from_options(spec_walk_options: &SpecWalkOptions) -> Result<Self, RunError> {
        Ok(Self {
            dirs_excluded: spec_walk_options.dirs_excluded.clone(),
            patterns_exclude_dirs: _compile(
                spec_walk_options.patterns_exclude_dirs.as_deref(),
                spec_walk_options.rule_pattern,
            )?,
        })
    }

    /// Leaf-name check: exact match against the excluded list, or any
    /// extra pattern hit.
    pub(crate) fn is_excluded(&self, name_dir: &str) -> bool {
        self.dirs_excluded.iter().any(|n| n == name_dir)
            || _is_pattern_matching(name_dir, self.patterns_exclude_dirs.as_ref())
    }
}

fn _compile(
    patterns: Option<&[String]>,
    rule_pattern: EnumCopyPatternMode,
) -> Result<Option<TypeCopyPatternSeq>, RunError> {
    let Some(patterns) = patterns else {
        return Ok(None);
    };
    if patterns.is_empty() {
        return Ok(None);
    }

    match rule_pattern {
        EnumCopyPatternMode::Literal => Ok(Some(TypeCopyPatternSeq::Literal(patterns.to_vec()))),
        EnumCopyPatternMode::Glob => {
            let mut l_glob = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let matcher = Glob::new(pattern)
                    .map_err(|e| {
                        RunError::InvalidPattern(format!("Invalid directory exclusion: {e}"))
                    })?
                    .compile_matcher();
                l_glob.push(matcher);
            }
            Ok(Some(TypeCopyPatternSeq::Glob(l_glob)))
        }
        EnumCopyPatternMode::Regex => {
            let mut l_regex = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let regex = Regex::new(pattern).map_err(|e| {
                    RunError::InvalidPattern(format!("Invalid directory exclusion: {e}"))
                })?;
                l_regex.push(regex);
            }
            Ok(Some(TypeCopyPatternSeq::Regex(l_regex)))
        }
    }
}

fn _is_pattern_matching(value: &str, patterns: Option<&TypeCopyPatternSeq>) -> bool {
    match patterns {
        None => false,
        Some(TypeCopyPatternSeq::Literal(v)) => v.iter().any(|p| value.contains(p.as_str())),
        Some(TypeCopyPatternSeq::Glob(v)) => v.iter().any(|p| p.is_match(value)),
        Some(TypeCopyPatternSeq::Regex(v)) => v.iter().any(|p| p.is_match(value)),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Attributes

/// Final path component as text, if the path has one.
pub(crate) fn derive_leaf_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}

#[cfg(windows)]
fn _has_hidden_or_system_attribute(meta: &fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
    meta.file_attributes() & (FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM) != 0
}

#[cfg(not(windows))]
fn _has_hidden_or_system_attribute(_meta: &fs::Metadata) -> bool {
    false
}

/// Hidden means dot-prefixed on Unix-likes and the attribute bit on Windows.
/// System only exists on Windows.
pub(crate) fn is_hidden_or_system(path: &Path, meta: &fs::Metadata) -> bool {
    #[cfg(not(windows))]
    {
        if derive_leaf_name(path).is_some_and(|n| n.starts_with('.')) {
            return true;
        }
    }
    _has_hidden_or_system_attribute(meta)
}

/// Local calendar date of the last modification.
pub(crate) fn derive_modified_date(meta: &fs::Metadata) -> io::Result<NaiveDate> {
    let time_modified = meta.modified()?;
    Ok(DateTime::<Local>::from(time_modified).date_naive())
}

pub(crate) fn is_date_within_range(
    date_value: NaiveDate,
    date_from: NaiveDate,
    date_to: NaiveDate,
) -> bool {
    date_from <= date_value && date_value <= date_to
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

fn _normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

/// `src` contains `dst` or vice versa, after resolving both.
pub(crate) fn is_overlap(src: &Path, dst: &Path) -> bool {
    let src_resolved = _normalize_path(src);
    let dst_resolved = _normalize_path(dst);
    dst_resolved.starts_with(&src_resolved) || src_resolved.starts_with(&dst_resolved)
}

/// User-facing text for an IO failure on `path`.
pub(crate) fn describe_io_error(path: &Path, e: &io::Error) -> String {
    match e.kind() {
        io::ErrorKind::PermissionDenied => format!("Permission denied: {}", path.display()),
        _ => format!("{}: {e}", path.display()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CopyPrimitives

/// Refuse to write through a destination entry that is a symlink, which
/// would land the copy outside the destination tree.
pub(crate) fn validate_destination_file(path_file_dst: &Path) -> Result<(), String> {
    match fs::symlink_metadata(path_file_dst) {
        Ok(meta_dst) if meta_dst.file_type().is_symlink() => Err(format!(
            "Unsafe destination path is an existing symlink: {}",
            path_file_dst.display()
        )),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(describe_io_error(path_file_dst, &e)),
    }
}

/// A copy from a read-only source is itself read-only; make an earlier copy
/// owner-writable again so it can be replaced.
fn _ensure_owner_writable(path_file_dst: &Path) -> Result<(), io::Error> {
    let meta_dst = match fs::symlink_metadata(path_file_dst) {
        Ok(v) => v,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if !meta_dst.is_file() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mode = meta_dst.permissions().mode();
        if mode & 0o200 == 0 {
            fs::set_permissions(path_file_dst, fs::Permissions::from_mode(mode | 0o200))?;
        }
    }
    #[cfg(not(unix))]
    {
        let mut perm_dst = meta_dst.permissions();
        if perm_dst.readonly() {
            perm_dst.set_readonly(false);
            fs::set_permissions(path_file_dst, perm_dst)?;
        }
    }
    Ok(())
}

/// Copy one file, replacing any existing destination file, and carry over
/// permissions, timestamps and (on Linux) extended attributes.
pub(crate) fn copy_file_with_metadata(
    path_file_src: &Path,
    path_file_dst: &Path,
) -> Result<(), io::Error> {
    use filetime::{FileTime, set_file_times};

    _ensure_owner_writable(path_file_dst)?;
    fs::copy(path_file_src, path_file_dst)?;

    let stat_src = fs::metadata(path_file_src)?;
    fs::set_permissions(path_file_dst, stat_src.permissions())?;
    let file_time_access = FileTime::from_last_access_time(&stat_src);
    let file_time_modify = FileTime::from_last_modification_time(&stat_src);
    set_file_times(path_file_dst, file_time_access, file_time_modify)?;

    #[cfg(target_os = "linux")]
    {
        copy_xattrs_linux(path_file_src, path_file_dst);
    }
    Ok(())
}

/// Mirror the source directory's attribute flags onto a freshly created
/// destination directory. Owner rwx is always kept so files can be written
/// into it afterwards.
pub(crate) fn copy_dir_attributes(
    path_dir_src: &Path,
    path_dir_dst: &Path,
) -> Result<(), io::Error> {
    let stat_src = fs::metadata(path_dir_src)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mode = stat_src.permissions().mode() | 0o700;
        fs::set_permissions(path_dir_dst, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    {
        fs::set_permissions(path_dir_dst, stat_src.permissions())?;
    }

    #[cfg(target_os = "linux")]
    {
        copy_xattrs_linux(path_dir_src, path_dir_dst);
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn copy_xattrs_linux(path_src: &Path, path_dst: &Path) {
    let iter_xattr_names = match xattr::list(path_src) {
        Ok(v) => v,
        Err(_) => return,
    };

    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_src, &name).ok().flatten() else {
            continue;
        };
        let _ = xattr::set(path_dst, &name, &raw_value);
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
