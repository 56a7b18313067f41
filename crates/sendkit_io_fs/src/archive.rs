//! Zip packaging of a finished destination tree.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{AesMode, CompressionMethod, ZipWriter};

use crate::spec::SpecArchiveOptions;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors produced while naming or writing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// IO failures while reading the tree or writing the archive.
    #[error("archive io failure ({operation}) on {}: {source}", path.display())]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Walkdir traversal failures.
    #[error("archive walk failure ({operation}) on {}: {source}", path.display())]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Zip encoder failures.
    #[error("archive zip failure ({operation}) on {}: {source}", path.display())]
    Zip {
        /// Operation that triggered the zip failure.
        operation: &'static str,
        /// Archive path.
        path: PathBuf,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },
    /// Input that cannot produce an archive.
    #[error("archive invalid input ({field}): {reason}")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
    },
}

impl ArchiveError {
    fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    fn zip(operation: &'static str, path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Zip {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// `<parent-of-destination>/<folder>[/<YYYYMMDD>]/<prefix>_<YYYYMMDD>.zip`
///
/// An existing destination is resolved first, so `..` and symlinked
/// components never put the archive inside the tree being zipped.
pub fn derive_archive_path(
    dir_destination: &Path,
    spec_archive_options: &SpecArchiveOptions,
    date_today: NaiveDate,
) -> ArchiveResult<PathBuf> {
    let path_dir_dst =
        fs::canonicalize(dir_destination).unwrap_or_else(|_| dir_destination.to_path_buf());
    let path_parent = path_dir_dst
        .parent()
        .ok_or(ArchiveError::InvalidInput {
            field: "dir_destination",
            reason: "destination has no parent directory",
        })?;
    if spec_archive_options.archive_prefix.is_empty() {
        return Err(ArchiveError::InvalidInput {
            field: "archive_prefix",
            reason: "archive prefix must not be empty",
        });
    }

    let c_date_stamp = date_today.format("%Y%m%d").to_string();
    let mut path_archive = path_parent.join(&spec_archive_options.archive_folder);
    if spec_archive_options.if_date_subfolder {
        path_archive.push(&c_date_stamp);
    }
    path_archive.push(format!(
        "{}_{c_date_stamp}.zip",
        spec_archive_options.archive_prefix
    ));
    Ok(path_archive)
}

/// Zip everything under `dir_source` into `path_archive`.
///
/// Entry names are relative to `dir_source` and use `/` separators; empty
/// directories are kept. With a password, file entries are AES-256
/// encrypted. The containing folder is created when missing and a partial
/// archive is removed on failure. Returns the number of entries written.
pub fn create_archive(
    dir_source: &Path,
    path_archive: &Path,
    password: Option<&str>,
) -> ArchiveResult<u64> {
    if let Some(path_parent) = path_archive.parent()
        && !path_parent.as_os_str().is_empty()
    {
        fs::create_dir_all(path_parent)
            .map_err(|e| ArchiveError::io("create_archive.create_dir", path_parent, e))?;
    }

    let file_archive = File::create(path_archive)
        .map_err(|e| ArchiveError::io("create_archive.create_file", path_archive, e))?;

    let res_write = write_entries(file_archive, dir_source, path_archive, password);
    match &res_write {
        Ok(n_entries) => info!(
            archive = %path_archive.display(),
            entries = n_entries,
            encrypted = password.is_some(),
            "archive written"
        ),
        Err(_) => {
            let _ = fs::remove_file(path_archive);
        }
    }
    res_write
}

fn write_entries(
    file_archive: File,
    dir_source: &Path,
    path_archive: &Path,
    password: Option<&str>,
) -> ArchiveResult<u64> {
    let mut zip = ZipWriter::new(file_archive);
    let options_base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut n_entries = 0_u64;

    for entry_res in WalkDir::new(dir_source).min_depth(1).sort_by_file_name() {
        let entry = entry_res.map_err(|source| ArchiveError::Walkdir {
            operation: "create_archive.walk",
            path: dir_source.to_path_buf(),
            source,
        })?;
        let path_entry = entry.path();
        let Some(c_name) = derive_entry_name(path_entry, dir_source) else {
            continue;
        };
        let meta_entry = entry
            .metadata()
            .map_err(|source| ArchiveError::Walkdir {
                operation: "create_archive.metadata",
                path: path_entry.to_path_buf(),
                source,
            })?;

        #[allow(unused_mut)]
        let mut options = options_base.large_file(meta_entry.len() >= u64::from(u32::MAX));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            options = options.unix_permissions(meta_entry.permissions().mode());
        }

        if entry.file_type().is_dir() {
            zip.add_directory(c_name, options)
                .map_err(|e| ArchiveError::zip("create_archive.add_directory", path_archive, e))?;
        } else if entry.file_type().is_file() {
            let res_start = match password {
                Some(pw) => zip.start_file(
                    c_name,
                    options.with_aes_encryption(AesMode::Aes256, pw),
                ),
                None => zip.start_file(c_name, options),
            };
            res_start.map_err(|e| ArchiveError::zip("create_archive.start_file", path_archive, e))?;

            let mut file_src = File::open(path_entry)
                .map_err(|e| ArchiveError::io("create_archive.open_entry", path_entry, e))?;
            io::copy(&mut file_src, &mut zip)
                .map_err(|e| ArchiveError::io("create_archive.write_entry", path_entry, e))?;
        } else {
            debug!(path = %path_entry.display(), "non-regular entry left out of archive");
            continue;
        }
        n_entries += 1;
    }

    zip.finish()
        .map_err(|e| ArchiveError::zip("create_archive.finish", path_archive, e))?;
    Ok(n_entries)
}

fn derive_entry_name(path_entry: &Path, dir_source: &Path) -> Option<String> {
    let path_rel = path_entry.strip_prefix(dir_source).ok()?;
    let l_parts: Vec<String> = path_rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    (!l_parts.is_empty()).then(|| l_parts.join("/"))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::io::Read;
    use std::path::{Path, PathBuf};

    use chrono::NaiveDate;

    use super::{ArchiveError, create_archive, derive_archive_path};
    use crate::spec::SpecArchiveOptions;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn sample_tree(root: &Path) -> PathBuf {
        let tree = root.join("export");
        std::fs::create_dir_all(tree.join("sub/deeper")).expect("mkdir tree");
        std::fs::create_dir_all(tree.join("empty")).expect("mkdir empty");
        std::fs::write(tree.join("a.txt"), "alpha").expect("write a");
        std::fs::write(tree.join("sub/deeper/b.txt"), "beta").expect("write b");
        tree
    }

    fn read_entry(archive: &mut zip::ZipArchive<std::fs::File>, name: &str) -> String {
        let mut entry = archive.by_name(name).expect("entry present");
        let mut txt = String::new();
        entry.read_to_string(&mut txt).expect("read entry");
        txt
    }

    #[test]
    fn archive_path_sits_next_to_destination() {
        let path = derive_archive_path(
            Path::new("/work/out/export"),
            &SpecArchiveOptions::default(),
            ymd(2024, 3, 7),
        )
        .expect("archive path");
        assert_eq!(
            path,
            PathBuf::from("/work/out/sending_source/source_20240307.zip")
        );
    }

    #[test]
    fn archive_path_with_date_subfolder() {
        let spec_archive_options = SpecArchiveOptions {
            archive_folder: "outbox".to_string(),
            archive_prefix: "src".to_string(),
            if_date_subfolder: true,
        };
        let path = derive_archive_path(
            Path::new("/work/export"),
            &spec_archive_options,
            ymd(2024, 12, 31),
        )
        .expect("archive path");
        assert_eq!(
            path,
            PathBuf::from("/work/outbox/20241231/src_20241231.zip")
        );
    }

    #[test]
    fn archive_path_resolves_parent_dir_components() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dst = tmp.path().join("out/export");
        std::fs::create_dir_all(dst.join("sub")).expect("mkdir dst");

        let path = derive_archive_path(
            &dst.join("sub/.."),
            &SpecArchiveOptions::default(),
            ymd(2024, 3, 7),
        )
        .expect("archive path");
        let path_expected = std::fs::canonicalize(tmp.path())
            .expect("canonical tmp")
            .join("out/sending_source/source_20240307.zip");
        assert_eq!(path, path_expected);
    }

    #[test]
    fn archive_path_rejects_root_destination() {
        let err = derive_archive_path(
            Path::new("/"),
            &SpecArchiveOptions::default(),
            ymd(2024, 1, 1),
        )
        .expect_err("root has no parent");
        assert!(matches!(err, ArchiveError::InvalidInput { .. }));
    }

    #[test]
    fn plain_archive_holds_relative_tree() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let tree = sample_tree(tmp.path());
        let path_archive = tmp.path().join("out/nested/x.zip");

        let n_entries = create_archive(&tree, &path_archive, None).expect("create archive");
        assert_eq!(n_entries, 5);

        let file = std::fs::File::open(&path_archive).expect("open archive");
        let mut archive = zip::ZipArchive::new(file).expect("read archive");
        let set_names: BTreeSet<String> = archive.file_names().map(str::to_string).collect();
        for name in ["a.txt", "empty/", "sub/", "sub/deeper/", "sub/deeper/b.txt"] {
            assert!(set_names.contains(name), "missing {name}: {set_names:?}");
        }
        assert_eq!(read_entry(&mut archive, "sub/deeper/b.txt"), "beta");
    }

    #[test]
    fn password_archive_requires_password() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let tree = sample_tree(tmp.path());
        let path_archive = tmp.path().join("secret.zip");

        create_archive(&tree, &path_archive, Some("s3cret")).expect("create archive");

        let file = std::fs::File::open(&path_archive).expect("open archive");
        let mut archive = zip::ZipArchive::new(file).expect("read archive");
        assert!(archive.by_name("a.txt").is_err());

        let mut entry = archive
            .by_name_decrypt("a.txt", b"s3cret")
            .expect("decrypt entry");
        let mut txt = String::new();
        entry.read_to_string(&mut txt).expect("read entry");
        assert_eq!(txt, "alpha");
    }

    #[test]
    fn missing_source_leaves_no_partial_archive() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_archive = tmp.path().join("broken.zip");

        let err = create_archive(&tmp.path().join("nope"), &path_archive, None)
            .expect_err("missing source must fail");
        assert!(matches!(err, ArchiveError::Walkdir { .. }));
        assert!(!path_archive.exists());
    }
}
