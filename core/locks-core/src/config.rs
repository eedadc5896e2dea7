//! Configuration loading.
//!
//! Handles paths and persistence for:
//! - locker settings (`<config_dir>/lfs-locks/config.json`)
//! - the log directory used by front ends
//!
//! A missing or malformed file is never fatal: defaults are used and a warning
//! is logged.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::controller::DEFAULT_LAYOUT_EXTENSION;

pub const CONFIG_PATH_ENV: &str = "LFS_LOCKS_CONFIG";
pub const GIT_PROGRAM_ENV: &str = "LFS_LOCKS_GIT";

const APP_DIR: &str = "lfs-locks";

/// User settings. Every field has a default, so partial files are fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerConfig {
    /// Program used to invoke `git lfs`.
    pub git_program: String,
    /// Extension of files that redirect to a layout file.
    pub layout_extension: String,
    pub refresh_interval_secs: u64,
    pub command_timeout_secs: u64,
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            git_program: "git".to_string(),
            layout_extension: DEFAULT_LAYOUT_EXTENSION.to_string(),
            refresh_interval_secs: 30,
            command_timeout_secs: 30,
        }
    }
}

impl LockerConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }

    /// Applies environment overrides through `lookup` (normally `std::env::var`).
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(program) = lookup(GIT_PROGRAM_ENV).filter(|p| !p.trim().is_empty()) {
            self.git_program = program;
        }
        self
    }
}

/// Returns the default config file path (`<config_dir>/lfs-locks/config.json`).
pub fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.json"))
}

/// Returns the directory for rolling log files.
pub fn get_log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join(APP_DIR).join("logs"))
}

/// Loads the configuration from `LFS_LOCKS_CONFIG` or the default path, then
/// applies environment overrides.
pub fn load_config() -> LockerConfig {
    let path = std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .or_else(get_config_path);

    let config = match path {
        Some(path) => load_config_from(&path),
        None => LockerConfig::default(),
    };
    config.with_env_overrides(|key| std::env::var(key).ok())
}

/// Loads `path`, returning defaults if it is missing or malformed.
pub fn load_config_from(path: &Path) -> LockerConfig {
    let content = match fs_err::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No config file; using defaults");
            return LockerConfig::default();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read config; using defaults");
            return LockerConfig::default();
        }
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "Malformed config; using defaults"
        );
        LockerConfig::default()
    })
}
