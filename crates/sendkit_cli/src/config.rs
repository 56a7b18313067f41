//! Defaults for the export form, loaded from `sendkit.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::Deserialize;

use sendkit_io_fs::{EnumCopyPatternMode, SpecArchiveOptions, SpecWalkOptions};

pub(crate) const CONFIG_FILE_NAME: &str = "sendkit.toml";
pub(crate) const CONFIG_ENV_VAR: &str = "SENDKIT_CONFIG";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum PatternMode {
    #[default]
    Glob,
    Regex,
    Literal,
}

impl From<PatternMode> for EnumCopyPatternMode {
    fn from(mode: PatternMode) -> Self {
        match mode {
            PatternMode::Glob => Self::Glob,
            PatternMode::Regex => Self::Regex,
            PatternMode::Literal => Self::Literal,
        }
    }
}

/// Every field is optional; command-line flags win over these values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SendkitConfig {
    /// Preloaded source directory.
    pub source_dir: Option<PathBuf>,
    /// Preloaded destination directory.
    pub destination_dir: Option<PathBuf>,
    /// Zip the destination after copying.
    pub compress: bool,
    /// Encrypt the zip.
    pub password_protect: bool,
    pub archive_folder: Option<String>,
    pub archive_prefix: Option<String>,
    pub archive_date_subfolder: bool,
    /// Replaces the built-in excluded directory names when set.
    pub exclude_dirs: Option<Vec<String>>,
    pub exclude_patterns: Vec<String>,
    pub pattern_mode: PatternMode,
}

impl SendkitConfig {
    /// Load from the first config file found; defaults when there is none.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let env_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        match resolve_config_path(explicit, env_path.as_deref())? {
            Some(path) => Ok((Self::load_from(&path)?, Some(path))),
            None => {
                tracing::debug!("no config file found, using defaults");
                Ok((Self::default(), None))
            }
        }
    }

    pub(crate) fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    pub(crate) fn walk_options(&self, extra_patterns: &[String]) -> SpecWalkOptions {
        let mut spec_walk_options = SpecWalkOptions {
            rule_pattern: self.pattern_mode.into(),
            ..SpecWalkOptions::default()
        };
        if let Some(dirs_excluded) = &self.exclude_dirs {
            spec_walk_options.dirs_excluded = dirs_excluded.clone();
        }
        let l_patterns: Vec<String> = self
            .exclude_patterns
            .iter()
            .chain(extra_patterns)
            .cloned()
            .collect();
        if !l_patterns.is_empty() {
            spec_walk_options.patterns_exclude_dirs = Some(l_patterns);
        }
        spec_walk_options
    }

    pub(crate) fn archive_options(&self) -> SpecArchiveOptions {
        let defaults = SpecArchiveOptions::default();
        SpecArchiveOptions {
            archive_folder: self
                .archive_folder
                .clone()
                .unwrap_or(defaults.archive_folder),
            archive_prefix: self
                .archive_prefix
                .clone()
                .unwrap_or(defaults.archive_prefix),
            if_date_subfolder: self.archive_date_subfolder,
        }
    }
}

/// Lookup order: explicit flag, `$SENDKIT_CONFIG`, `./sendkit.toml`, then the
/// platform user config directory. Explicit paths must exist.
fn resolve_config_path(explicit: Option<&Path>, env_path: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit.or(env_path) {
        if !path.is_file() {
            bail!("config file not found: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Ok(Some(local));
    }

    Ok(ProjectDirs::from("", "", "sendkit")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let cfg: SendkitConfig = toml::from_str(
            r#"
            source_dir = "/src/repo"
            destination_dir = "/out/export"
            compress = true
            password_protect = true
            archive_folder = "outbox"
            archive_prefix = "src"
            archive_date_subfolder = true
            exclude_dirs = ["target"]
            exclude_patterns = ["^node_"]
            pattern_mode = "regex"
            "#,
        )
        .expect("parse config");

        assert_eq!(cfg.source_dir, Some(PathBuf::from("/src/repo")));
        assert!(cfg.compress && cfg.password_protect);

        let spec_walk_options = cfg.walk_options(&["^dist$".to_string()]);
        assert_eq!(spec_walk_options.dirs_excluded, vec!["target".to_string()]);
        assert_eq!(
            spec_walk_options.patterns_exclude_dirs,
            Some(vec!["^node_".to_string(), "^dist$".to_string()])
        );
        assert_eq!(spec_walk_options.rule_pattern, EnumCopyPatternMode::Regex);

        let spec_archive_options = cfg.archive_options();
        assert_eq!(spec_archive_options.archive_folder, "outbox");
        assert_eq!(spec_archive_options.archive_prefix, "src");
        assert!(spec_archive_options.if_date_subfolder);
    }

    #[test]
    fn empty_config_keeps_builtin_defaults() {
        let cfg: SendkitConfig = toml::from_str("").expect("parse empty");
        assert_eq!(cfg, SendkitConfig::default());

        let spec_walk_options = cfg.walk_options(&[]);
        assert_eq!(spec_walk_options.dirs_excluded.len(), 5);
        assert!(spec_walk_options.patterns_exclude_dirs.is_none());
        assert_eq!(cfg.archive_options(), SpecArchiveOptions::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<SendkitConfig>("sorce_dir = \"/x\"").is_err());
    }

    #[test]
    fn explicit_path_must_exist() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let missing = tmp.path().join("missing.toml");
        assert!(resolve_config_path(Some(&missing), None).is_err());

        let present = tmp.path().join("sendkit.toml");
        std::fs::write(&present, "compress = true\n").expect("write config");
        assert_eq!(
            resolve_config_path(None, Some(&present)).expect("resolve"),
            Some(present.clone())
        );
        let cfg = SendkitConfig::load_from(&present).expect("load");
        assert!(cfg.compress);
    }
}
