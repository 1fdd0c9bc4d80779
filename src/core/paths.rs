//! core::paths
//!
//! Centralized path routing for gateway storage locations.
//!
//! # Storage Layout
//!
//! Served repositories live directly below the configured root:
//! `<root>/<repository>/.git`. Per-repository gateway data is kept under
//! the repository's git directory so that it travels with the repository
//! and is shared by every server process serving it:
//!
//! - `<git_dir>/gitgate/config.toml` - Repository configuration
//! - `<git_dir>/gitgate/lock` - Exclusive lock serializing rebase state changes
//!
//! **Hard rule:** no code outside this module computes `*.join("gitgate")`.
//!
//! # Example
//!
//! ```
//! use gitgate::core::paths::GatewayPaths;
//! use std::path::PathBuf;
//!
//! let paths = GatewayPaths::new(PathBuf::from("/srv/repos/demo/.git"));
//! assert_eq!(paths.repo_lock_path(), PathBuf::from("/srv/repos/demo/.git/gitgate/lock"));
//! ```

use std::path::{Path, PathBuf};

/// Name of the directory holding gateway data inside a git directory.
const GATEWAY_DIR: &str = "gitgate";

/// Per-repository storage locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPaths {
    /// Path to the repository's `.git` directory.
    pub git_dir: PathBuf,
}

impl GatewayPaths {
    pub fn new(git_dir: PathBuf) -> Self {
        Self { git_dir }
    }

    /// Root gateway directory under the git directory.
    pub fn repo_gateway_dir(&self) -> PathBuf {
        self.git_dir.join(GATEWAY_DIR)
    }

    /// `<git_dir>/gitgate/config.toml`
    pub fn repo_config_path(&self) -> PathBuf {
        self.repo_gateway_dir().join("config.toml")
    }

    /// `<git_dir>/gitgate/lock`
    pub fn repo_lock_path(&self) -> PathBuf {
        self.repo_gateway_dir().join("lock")
    }
}

/// Locate a served repository's working directory below `root`.
///
/// `name` is a single, already validated path segment. Returns `None` when
/// the directory does not exist or is not a non-bare repository.
pub fn served_repository(root: &Path, name: &str) -> Option<PathBuf> {
    let dir = root.join(name);
    if dir.join(".git").exists() {
        Some(dir)
    } else {
        None
    }
}
