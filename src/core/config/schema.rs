//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `--config <file>` on the command line
//! 2. `$GITGATE_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/gitgate/config.toml`
//! 4. `~/.gitgate/config.toml` (canonical write location)
//!
//! # Repo Config
//!
//! Located at `<git_dir>/gitgate/config.toml`.
//!
//! # Validation
//!
//! Config values are validated after parsing so a bad file is reported at
//! startup (global) or on first use of the repository (repo).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// Global configuration (server scope).
///
/// # Example
///
/// ```toml
/// root = "/srv/git"
/// bind = "0.0.0.0"
/// port = 8080
///
/// [tasks]
/// wait_ms = 100
/// retention_secs = 900
/// max_workers = 8
///
/// [identity]
/// name = "Gateway"
/// email = "gateway@example.com"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Directory holding the served repositories
    pub root: Option<PathBuf>,

    /// Address to bind the HTTP listener to
    pub bind: Option<String>,

    /// Port to listen on
    pub port: Option<u16>,

    /// Task registry tuning
    pub tasks: Option<TaskSettings>,

    /// Fallback committer identity
    pub identity: Option<Identity>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == Some(0) {
            return Err(ConfigError::InvalidValue("port cannot be 0".into()));
        }
        if let Some(bind) = &self.bind {
            if bind.trim().is_empty() {
                return Err(ConfigError::InvalidValue("bind cannot be empty".into()));
            }
        }
        if let Some(tasks) = &self.tasks {
            tasks.validate()?;
        }
        if let Some(identity) = &self.identity {
            identity.validate()?;
        }
        Ok(())
    }
}

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// remote = "upstream"
///
/// [identity]
/// name = "Release Bot"
/// email = "release@example.com"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Default remote name (default: "origin")
    pub remote: Option<String>,

    /// Identity override for commits made through the gateway
    pub identity: Option<Identity>,
}

impl RepoConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote {
            BranchName::new(remote.as_str())
                .map_err(|e| ConfigError::InvalidValue(format!("invalid remote name: {e}")))?;
        }
        if let Some(identity) = &self.identity {
            identity.validate()?;
        }
        Ok(())
    }
}

/// Task registry settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TaskSettings {
    /// How long a long-running request waits before answering 202
    pub wait_ms: Option<u64>,

    /// How long a finished task stays pollable
    pub retention_secs: Option<u64>,

    /// Maximum number of operations executing at once
    pub max_workers: Option<usize>,
}

impl TaskSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == Some(0) {
            return Err(ConfigError::InvalidValue(
                "tasks.max_workers must be at least 1".into(),
            ));
        }
        if self.retention_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "tasks.retention_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A committer identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Identity {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(ConfigError::InvalidValue(format!(
                    "identity email '{email}' must contain '@'"
                )));
            }
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "identity name cannot be empty".into(),
                ));
            }
        }
        Ok(())
    }

    /// Both halves present.
    pub fn complete(&self) -> Option<(&str, &str)> {
        Some((self.name.as_deref()?, self.email.as_deref()?))
    }
}
