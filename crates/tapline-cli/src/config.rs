//! Configuration file management for tapline.
//!
//! Provides a TOML-based config file at `~/.config/tapline/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use tapline_core::SessionConfig;

pub const PROJECT_PATH_ENV: &str = "TAPLINE_XCODE_PROJECT_PATH";
pub const LOG_DIR_ENV: &str = "TAPLINE_LOG_DIR";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub xcode: XcodeSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct XcodeSection {
    /// Path to the `.xcodeproj`; when unset the project is searched for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_bundle_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_template: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown_timeout_secs: Option<u64>,
    #[serde(default)]
    pub keep_workspace: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub verbose: bool,
    /// Copy attachments next to the text log.
    #[serde(default)]
    pub save_attachments: bool,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the tapline config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/tapline` or `~/.config/tapline`,
/// also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("tapline");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tapline")
}

/// Return the path to the tapline config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Where result logs go when nothing else is configured.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tapline")
        .join("logs")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the config file at `path`. A missing file is `Ok(None)`; a file
/// that does not parse is an error.
pub fn load_config_from(path: &Path) -> Result<Option<ConfigFile>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read config file at {}", path.display()));
        }
    };
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

pub fn load_config() -> Result<Option<ConfigFile>> {
    load_config_from(&config_path())
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))
}

pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(&config_path(), config)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line; they win over everything else.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub project_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub keep_workspace: bool,
    pub verbose: bool,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone)]
pub struct TaplineConfig {
    pub session: SessionConfig,
    pub log_dir: PathBuf,
    pub verbose: bool,
    pub save_attachments: bool,
}

impl TaplineConfig {
    /// Resolve against the config file at [`config_path`].
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        Ok(Self::resolve_with(cli, load_config()?))
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - Project path: `--project-path` > `TAPLINE_XCODE_PROJECT_PATH` >
    ///   `xcode.project_path` > search at session start
    /// - Log dir: `--log-dir` > `TAPLINE_LOG_DIR` > `logging.log_dir` >
    ///   [`default_log_dir`]
    /// - Flags (`keep_workspace`, `verbose`) are on if either the CLI or the
    ///   file turns them on.
    pub fn resolve_with(cli: &CliOverrides, file: Option<ConfigFile>) -> Self {
        let file = file.unwrap_or_default();
        let mut session = SessionConfig::default();

        session.project_path = cli
            .project_path
            .clone()
            .or_else(|| env_path(PROJECT_PATH_ENV))
            .or(file.xcode.project_path);
        if let Some(name) = file.xcode.project_file_name {
            session.project_file_name = name;
        }
        if let Some(name) = file.xcode.app_bundle_name {
            session.app_bundle_name = name;
        }
        if let Some(args) = file.xcode.build_args {
            session.build_args = args;
        }
        session.trace_template = file.xcode.trace_template;

        if let Some(root) = file.session.workspace_root {
            session.workspace_root = root;
        }
        if let Some(secs) = file.session.response_timeout_secs {
            session.channel.response_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.session.shutdown_timeout_secs {
            session.shutdown_timeout = Duration::from_secs(secs);
        }
        session.keep_workspace = cli.keep_workspace || file.session.keep_workspace;

        let log_dir = cli
            .log_dir
            .clone()
            .or_else(|| env_path(LOG_DIR_ENV))
            .or(file.logging.log_dir)
            .unwrap_or_else(default_log_dir);

        Self {
            session,
            log_dir,
            verbose: cli.verbose || file.logging.verbose,
            save_attachments: file.logging.save_attachments,
        }
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn clear_env() {
        unsafe { std::env::remove_var(PROJECT_PATH_ENV) };
        unsafe { std::env::remove_var(LOG_DIR_ENV) };
    }

    fn file_with_paths() -> ConfigFile {
        ConfigFile {
            xcode: XcodeSection {
                project_path: Some(PathBuf::from("/file/App.xcodeproj")),
                ..XcodeSection::default()
            },
            logging: LoggingSection {
                log_dir: Some(PathBuf::from("/file/logs")),
                ..LoggingSection::default()
            },
            ..ConfigFile::default()
        }
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("tapline").join("config.toml");

        let original = ConfigFile {
            xcode: XcodeSection {
                project_path: Some(PathBuf::from("/Users/dev/TestApp/TestApp.xcodeproj")),
                build_args: Some(vec!["-sdk".into(), "iphonesimulator".into()]),
                ..XcodeSection::default()
            },
            session: SessionSection {
                shutdown_timeout_secs: Some(5),
                keep_workspace: true,
                ..SessionSection::default()
            },
            logging: LoggingSection {
                verbose: true,
                ..LoggingSection::default()
            },
        };

        save_config_to(&path, &original).unwrap();
        let loaded = load_config_from(&path).unwrap().expect("file should exist");
        assert_eq!(loaded, original);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(load_config_from(&tmp.path().join("nope.toml")).unwrap().is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[xcode\nproject_path = 1").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config file"));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: ConfigFile = toml::from_str("").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();
        unsafe { std::env::set_var(PROJECT_PATH_ENV, "/env/App.xcodeproj") };
        unsafe { std::env::set_var(LOG_DIR_ENV, "/env/logs") };

        let cli = CliOverrides {
            project_path: Some(PathBuf::from("/cli/App.xcodeproj")),
            log_dir: Some(PathBuf::from("/cli/logs")),
            ..CliOverrides::default()
        };
        let config = TaplineConfig::resolve_with(&cli, Some(file_with_paths()));
        clear_env();

        assert_eq!(config.session.project_path, Some(PathBuf::from("/cli/App.xcodeproj")));
        assert_eq!(config.log_dir, PathBuf::from("/cli/logs"));
    }

    #[test]
    fn resolve_with_env_var_overrides_config_file() {
        let _lock = lock_env();
        unsafe { std::env::set_var(PROJECT_PATH_ENV, "/env/App.xcodeproj") };
        unsafe { std::env::set_var(LOG_DIR_ENV, "/env/logs") };

        let config = TaplineConfig::resolve_with(&CliOverrides::default(), Some(file_with_paths()));
        clear_env();

        assert_eq!(config.session.project_path, Some(PathBuf::from("/env/App.xcodeproj")));
        assert_eq!(config.log_dir, PathBuf::from("/env/logs"));
    }

    #[test]
    fn resolve_falls_back_to_config_file() {
        let _lock = lock_env();
        clear_env();

        let config = TaplineConfig::resolve_with(&CliOverrides::default(), Some(file_with_paths()));
        assert_eq!(config.session.project_path, Some(PathBuf::from("/file/App.xcodeproj")));
        assert_eq!(config.log_dir, PathBuf::from("/file/logs"));
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        clear_env();

        let config = TaplineConfig::resolve_with(&CliOverrides::default(), None);
        assert_eq!(config.session.project_path, None);
        assert_eq!(config.log_dir, default_log_dir());
        assert_eq!(
            config.session.artifact_attempts,
            SessionConfig::DEFAULT_ARTIFACT_ATTEMPTS
        );
        assert!(!config.verbose);
        assert!(!config.session.keep_workspace);
    }

    #[test]
    fn empty_env_var_is_ignored() {
        let _lock = lock_env();
        unsafe { std::env::set_var(LOG_DIR_ENV, "") };

        let config = TaplineConfig::resolve_with(&CliOverrides::default(), Some(file_with_paths()));
        clear_env();

        assert_eq!(config.log_dir, PathBuf::from("/file/logs"));
    }

    #[test]
    fn file_session_settings_are_applied() {
        let _lock = lock_env();
        clear_env();

        let file: ConfigFile = toml::from_str(
            r#"
            [xcode]
            app_bundle_name = "Other.app"

            [session]
            workspace_root = "/var/tmp/tapline"
            response_timeout_secs = 5
            keep_workspace = true
            "#,
        )
        .unwrap();

        let config = TaplineConfig::resolve_with(&CliOverrides::default(), Some(file));
        assert_eq!(config.session.app_bundle_name, "Other.app");
        assert_eq!(config.session.workspace_root, PathBuf::from("/var/tmp/tapline"));
        assert_eq!(config.session.channel.response_timeout, Duration::from_secs(5));
        assert!(config.session.keep_workspace);
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("tapline/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
