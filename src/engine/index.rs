//! engine::index
//!
//! The staging area: `PUT` stages, `DELETE` unstages, `GET` reads what is
//! staged for a file, `POST` resets. An address without a path means the
//! whole tree.

use serde::Deserialize;

use super::error::GatewayError;
use super::Repo;
use crate::core::address::ResourceAddress;
use crate::git::ResetMode;

/// Body of `POST index/file/{repo}/...`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResetBody {
    /// `SOFT`, `MIXED` or `HARD`
    pub reset: Option<String>,
    #[serde(default)]
    pub path: Vec<String>,
    /// Target of the reset; HEAD when absent
    pub commit: Option<String>,
}

/// Stage the file or folder `address` names.
pub fn stage(repo: &Repo, address: &ResourceAddress) -> Result<(), GatewayError> {
    let path = address.relative_path().unwrap_or_default();
    let _lock = repo.lock()?;
    repo.git().stage(path)?;
    tracing::debug!(repository = repo.name(), path, "staged");
    Ok(())
}

/// Reset the index entries under `address` to HEAD.
pub fn unstage(repo: &Repo, address: &ResourceAddress) -> Result<(), GatewayError> {
    let path = address.relative_path().unwrap_or_default();
    let _lock = repo.lock()?;
    repo.git().unstage(path)?;
    tracing::debug!(repository = repo.name(), path, "unstaged");
    Ok(())
}

/// Apply a reset request.
///
/// With paths (from the body or the address) only those index entries
/// return to HEAD, which is the one form a path reset can take. Without
/// paths HEAD moves to `Commit` in the given mode.
pub fn reset(repo: &Repo, address: &ResourceAddress, body: &ResetBody) -> Result<(), GatewayError> {
    let mode = body.reset.as_deref().map(reset_mode).transpose()?;
    let mut paths = body.path.clone();
    if paths.is_empty() {
        if let Some(path) = address.relative_path().filter(|p| !p.is_empty()) {
            paths.push(path.to_string());
        }
    }

    if !paths.is_empty() {
        if body.commit.is_some() {
            return Err(GatewayError::BadRequest(
                "a path reset cannot name a commit".into(),
            ));
        }
        if mode.is_some_and(|m| m != ResetMode::Mixed) {
            return Err(GatewayError::BadRequest(
                "paths can only be reset in MIXED mode".into(),
            ));
        }
        let _lock = repo.lock()?;
        for path in &paths {
            repo.git().unstage(path.trim_matches('/'))?;
        }
        tracing::info!(repository = repo.name(), paths = paths.len(), "reset paths");
        return Ok(());
    }

    let mode = mode.ok_or_else(|| GatewayError::BadRequest("Reset type must be specified".into()))?;
    let target = body.commit.as_deref().unwrap_or("HEAD");
    let _lock = repo.lock()?;
    let git = repo.git();
    match git.try_resolve_commit(target)? {
        Some(oid) => git.reset(&oid, mode)?,
        None if body.commit.is_none() && mode == ResetMode::Mixed => git.unstage("")?,
        None => {
            return Err(GatewayError::NotFound(format!("no commit '{target}' to reset to")));
        }
    }
    tracing::info!(repository = repo.name(), target, ?mode, "reset");
    Ok(())
}

fn reset_mode(name: &str) -> Result<ResetMode, GatewayError> {
    match name {
        "SOFT" => Ok(ResetMode::Soft),
        "MIXED" => Ok(ResetMode::Mixed),
        "HARD" => Ok(ResetMode::Hard),
        "KEEP" | "MERGE" => Err(GatewayError::BadRequest(format!(
            "the reset type is not supported: {name}"
        ))),
        other => Err(GatewayError::BadRequest(format!(
            "unknown or malformed reset type: {other}"
        ))),
    }
}

/// Content staged for the file `address` names.
pub fn staged_content(repo: &Repo, address: &ResourceAddress) -> Result<Vec<u8>, GatewayError> {
    let path = address
        .relative_path()
        .filter(|_| !address.is_folder())
        .ok_or_else(|| GatewayError::BadRequest("index content needs a file path".into()))?;
    Ok(repo.git().index_blob(path)?)
}
