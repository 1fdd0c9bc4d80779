//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! The gateway has two configuration scopes:
//! - **Global**: server-level settings (root, listener, tasks, identity)
//! - **Repo**: per-repository overrides (default remote, identity)
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (applied by the `serve` command)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. An explicit path (`--config`), which must exist
//! 2. `$GITGATE_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/gitgate/config.toml`
//! 4. `~/.gitgate/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use gitgate::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("listening on {}:{}", config.bind(), config.port());
//! println!("tasks wait {:?} before answering 202", config.task_wait());
//! ```

pub mod schema;

pub use schema::{GlobalConfig, Identity, RepoConfig, TaskSettings};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::paths::GatewayPaths;

/// Default wait before a long-running request is answered with 202.
pub const DEFAULT_TASK_WAIT_MS: u64 = 100;
/// Default retention of finished tasks.
pub const DEFAULT_TASK_RETENTION_SECS: u64 = 900;
/// Default cap on concurrently executing operations.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Merged configuration.
///
/// Accessors apply precedence rules: repo config overrides global config,
/// which overrides built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Repository configuration (if loaded for a repository)
    pub repo: Option<RepoConfig>,
    global_path: Option<PathBuf>,
}

impl Config {
    /// Load the global configuration.
    ///
    /// Missing config files are not an error (defaults are used), except an
    /// explicitly named one.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (global, global_path) = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                (read_toml::<GlobalConfig>(path)?, Some(path.to_path_buf()))
            }
            None => Self::load_global()?,
        };
        global.validate()?;

        if let Some(path) = &global_path {
            tracing::debug!(path = %path.display(), "loaded global config");
        }

        Ok(Self {
            global,
            repo: None,
            global_path,
        })
    }

    fn load_global() -> Result<(GlobalConfig, Option<PathBuf>), ConfigError> {
        let mut candidates = Vec::new();
        if let Ok(path) = std::env::var("GITGATE_CONFIG") {
            candidates.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            candidates.push(PathBuf::from(xdg_home).join("gitgate/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".gitgate/config.toml"));
        }

        for path in candidates {
            if path.exists() {
                let config = read_toml(&path)?;
                return Ok((config, Some(path)));
            }
        }
        Ok((GlobalConfig::default(), None))
    }

    /// This configuration with a repository's overrides layered on top.
    pub fn for_repository(&self, paths: &GatewayPaths) -> Result<Self, ConfigError> {
        let path = paths.repo_config_path();
        let repo = if path.exists() {
            let repo: RepoConfig = read_toml(&path)?;
            repo.validate()?;
            Some(repo)
        } else {
            None
        };
        Ok(Self {
            repo,
            ..self.clone()
        })
    }

    /// Get the canonical path for global config (`~/.gitgate/config.toml`).
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".gitgate/config.toml"))
    }

    /// Write repo config atomically.
    pub fn write_repo(paths: &GatewayPaths, config: &RepoConfig) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        let path = paths.repo_config_path();
        write_config_atomic(&path, config)?;
        Ok(path)
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Directory holding the served repositories, if configured.
    pub fn root(&self) -> Option<&Path> {
        self.global.root.as_deref()
    }

    /// Listener address. Defaults to `127.0.0.1`.
    pub fn bind(&self) -> &str {
        self.global.bind.as_deref().unwrap_or("127.0.0.1")
    }

    /// Listener port. Defaults to `8080`.
    pub fn port(&self) -> u16 {
        self.global.port.unwrap_or(8080)
    }

    fn tasks(&self) -> Option<&TaskSettings> {
        self.global.tasks.as_ref()
    }

    /// How long a long-running request waits before answering 202.
    pub fn task_wait(&self) -> Duration {
        Duration::from_millis(
            self.tasks()
                .and_then(|t| t.wait_ms)
                .unwrap_or(DEFAULT_TASK_WAIT_MS),
        )
    }

    /// How long a finished task stays pollable.
    pub fn task_retention(&self) -> Duration {
        Duration::from_secs(
            self.tasks()
                .and_then(|t| t.retention_secs)
                .unwrap_or(DEFAULT_TASK_RETENTION_SECS),
        )
    }

    /// Maximum number of concurrently executing operations.
    pub fn max_workers(&self) -> usize {
        self.tasks()
            .and_then(|t| t.max_workers)
            .unwrap_or(DEFAULT_MAX_WORKERS)
    }

    /// Default remote name. Defaults to `origin`.
    pub fn remote(&self) -> &str {
        self.repo
            .as_ref()
            .and_then(|r| r.remote.as_deref())
            .unwrap_or("origin")
    }

    /// Committer identity override: repo first, then global.
    pub fn identity(&self) -> Option<(&str, &str)> {
        self.repo
            .as_ref()
            .and_then(|r| r.identity.as_ref())
            .and_then(Identity::complete)
            .or_else(|| self.global.identity.as_ref().and_then(Identity::complete))
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write a config file atomically (temp file in the same directory, then rename).
fn write_config_atomic<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ConfigError::WriteError { path, source }
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err(path))?;
    }

    let contents =
        toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    let temp_path = path.with_extension("toml.tmp");
    let mut file = fs::File::create(&temp_path).map_err(write_err(&temp_path))?;
    file.write_all(contents.as_bytes())
        .map_err(write_err(&temp_path))?;
    file.sync_all().map_err(write_err(&temp_path))?;

    fs::rename(&temp_path, path).map_err(write_err(path))?;
    Ok(())
}
