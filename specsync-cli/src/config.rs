//! Configuration file loading for specsync.
//!
//! Discovers and loads `specsync.toml` from the project root.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::Deserialize;
use specsync_core::settings::ProjectSettings;
use std::time::Duration;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "specsync.toml";

/// Top-level configuration from specsync.toml.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecsyncConfig {
    pub paths: PathsConfig,
    pub sync: SyncConfig,
}

/// Directory layout, relative to the project root unless absolute.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub specs_dir: Utf8PathBuf,
    pub state_dir: Utf8PathBuf,
    pub artifacts_dir: Utf8PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            specs_dir: Utf8PathBuf::from("specifications"),
            state_dir: Utf8PathBuf::from(".specsync"),
            artifacts_dir: Utf8PathBuf::from("generated"),
        }
    }
}

/// Breaking changes are acknowledged per invocation with `--force`; the
/// file has no key for it and rejects one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Deadline for the I/O phase of a sync, in milliseconds.
    pub deadline_ms: Option<u64>,
}

/// Discover the specsync.toml config file.
///
/// Returns `None` if no config file is found.
pub fn discover_config(project_root: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = project_root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

pub fn load_config(path: &Utf8Path) -> anyhow::Result<SpecsyncConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<SpecsyncConfig> {
    let config: SpecsyncConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from the project root, or return default if not found.
pub fn load_or_default(project_root: &Utf8Path) -> anyhow::Result<SpecsyncConfig> {
    match discover_config(project_root) {
        Some(path) => load_config(&path),
        None => Ok(SpecsyncConfig::default()),
    }
}

/// Path flags given on the command line.
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub specs_dir: Option<Utf8PathBuf>,
    pub state_dir: Option<Utf8PathBuf>,
    pub artifacts_dir: Option<Utf8PathBuf>,
}

/// Sync behaviour after merging file and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedSync {
    pub force: bool,
    pub deadline: Option<Duration>,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: SpecsyncConfig,
}

impl ConfigMerger {
    pub fn new(config: SpecsyncConfig) -> Self {
        Self { config }
    }

    /// Resolve every path against `project_root`; CLI paths win.
    pub fn settings(&self, project_root: &Utf8Path, cli: &PathOverrides) -> ProjectSettings {
        let mut settings = ProjectSettings::for_root(project_root);
        let paths = &self.config.paths;
        settings.specs_dir = settings.resolve(cli.specs_dir.as_ref().unwrap_or(&paths.specs_dir));
        settings.state_dir = settings.resolve(cli.state_dir.as_ref().unwrap_or(&paths.state_dir));
        settings.artifacts_dir = settings.resolve(
            cli.artifacts_dir
                .as_ref()
                .unwrap_or(&paths.artifacts_dir),
        );
        settings.deadline = self.config.sync.deadline_ms.map(Duration::from_millis);
        settings
    }

    /// `--force` only ever comes from the command line; `--deadline-ms`
    /// overrides the file.
    pub fn merge_sync(&self, cli_force: bool, cli_deadline_ms: Option<u64>) -> MergedSync {
        MergedSync {
            force: cli_force,
            deadline: cli_deadline_ms
                .or(self.config.sync.deadline_ms)
                .map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(parse_config("").unwrap(), SpecsyncConfig::default());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = parse_config(
            r#"
[paths]
specs_dir = "api"

[sync]
deadline_ms = 1500
"#,
        )
        .unwrap();
        assert_eq!(config.paths.specs_dir, "api");
        assert_eq!(config.paths.state_dir, ".specsync");
        assert_eq!(config.sync.deadline_ms, Some(1500));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let err = parse_config("[paths\n").unwrap_err();
        assert!(format!("{err:#}").contains("invalid TOML"));
    }

    #[test]
    fn cli_paths_override_file_paths() {
        let config = parse_config("[paths]\nspecs_dir = \"api\"\nstate_dir = \"/var/specsync\"\n")
            .unwrap();
        let merger = ConfigMerger::new(config);
        let settings = merger.settings(
            Utf8Path::new("/work"),
            &PathOverrides {
                specs_dir: Some(Utf8PathBuf::from("contracts")),
                ..PathOverrides::default()
            },
        );
        assert_eq!(settings.specs_dir, "/work/contracts");
        assert_eq!(settings.state_dir, "/var/specsync");
        assert_eq!(settings.artifacts_dir, "/work/generated");
    }

    #[test]
    fn force_key_is_rejected() {
        let err = parse_config("[sync]\nforce = true\n").unwrap_err();
        assert!(format!("{err:#}").contains("force"), "{err:#}");
    }

    #[test]
    fn force_comes_from_cli_and_deadline_is_overridden() {
        let merger = ConfigMerger::new(parse_config("[sync]\ndeadline_ms = 100\n").unwrap());
        let merged = merger.merge_sync(false, Some(50));
        assert!(!merged.force);
        assert_eq!(merged.deadline, Some(Duration::from_millis(50)));
        assert_eq!(
            merger.merge_sync(false, None).deadline,
            Some(Duration::from_millis(100))
        );

        let merger = ConfigMerger::new(SpecsyncConfig::default());
        assert_eq!(
            merger.merge_sync(true, None),
            MergedSync {
                force: true,
                deadline: None
            }
        );
    }
}
