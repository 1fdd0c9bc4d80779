//! core::ops::lock
//!
//! Single-writer guard for a served repository.
//!
//! Every request that moves HEAD, the index or the working tree (commit,
//! merge, rebase, revert, cherry-pick, checkout, stage, reset, stash,
//! pull) runs while holding this lock. Rebase state is the one piece of
//! state that spans requests; holding the lock across read-then-change
//! keeps two concurrent `CONTINUE`s from applying the same step.
//!
//! The lock is an `fs2` exclusive lock on `<git_dir>/gitgate/lock`, so it
//! serializes writers across server processes as well as threads. It is
//! released when the guard drops.

use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::GatewayPaths;

/// Errors from taking the repository lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock file or its directory could not be created.
    #[error("cannot create lock file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The OS refused the lock.
    #[error("cannot lock {path}: {source}")]
    Acquire {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Held exclusive lock on one repository.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    file: File,
}

impl RepoLock {
    /// Take the lock, waiting while another writer holds it.
    pub fn acquire(paths: &GatewayPaths) -> Result<Self, LockError> {
        let dir = paths.repo_gateway_dir();
        fs::create_dir_all(&dir).map_err(|source| LockError::Create {
            path: dir.clone(),
            source,
        })?;

        let path = paths.repo_lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Create {
                path: path.clone(),
                source,
            })?;
        file.lock_exclusive().map_err(|source| LockError::Acquire {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "repository lock taken");
        Ok(Self { path, file })
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "could not release repository lock");
        }
    }
}
