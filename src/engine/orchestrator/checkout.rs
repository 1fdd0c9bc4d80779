//! engine::orchestrator::checkout
//!
//! Checkout by path restores index content and is lenient: stale paths are
//! skipped so batch requests with partly outdated lists succeed. Checkout
//! by branch is strict: if local changes would be overwritten, nothing
//! moves and the colliding paths are reported.

use serde::Deserialize;

use crate::core::types::BranchName;
use crate::engine::error::GatewayError;
use crate::engine::Repo;

/// Body of `PUT clone/file/{repo}/`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckoutBody {
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default)]
    pub remove_untracked: bool,
    pub branch: Option<String>,
}

/// Apply a checkout request.
pub fn checkout(repo: &Repo, body: &CheckoutBody) -> Result<(), GatewayError> {
    match (&body.branch, body.path.is_empty()) {
        (Some(_), false) => Err(GatewayError::BadRequest(
            "give either Branch or Path, not both".into(),
        )),
        (Some(branch), true) => checkout_branch(repo, branch),
        (None, false) => checkout_paths(repo, &body.path, body.remove_untracked),
        (None, true) => Err(GatewayError::BadRequest(
            "checkout needs a Branch or a Path list".into(),
        )),
    }
}

/// Restore `paths` (repository-relative) from the index.
pub fn checkout_paths(repo: &Repo, paths: &[String], remove_untracked: bool) -> Result<(), GatewayError> {
    let paths = paths
        .iter()
        .map(|p| normalize(p))
        .collect::<Result<Vec<_>, _>>()?;
    let _lock = repo.lock()?;
    repo.git().checkout_paths(&paths, remove_untracked)?;
    tracing::info!(repository = repo.name(), paths = paths.len(), remove_untracked, "checked out paths");
    Ok(())
}

/// Switch HEAD to `branch`, creating a tracking branch from the default
/// remote when only the remote one exists.
pub fn checkout_branch(repo: &Repo, branch: &str) -> Result<(), GatewayError> {
    let name = BranchName::new(branch)?;
    let _lock = repo.lock()?;
    repo.git().checkout_branch(&name, repo.config().remote())?;
    tracing::info!(repository = repo.name(), branch = %name, "checked out branch");
    Ok(())
}

fn normalize(path: &str) -> Result<String, GatewayError> {
    let trimmed = path.trim_matches('/');
    let bad = trimmed.is_empty()
        || trimmed.contains('\\')
        || trimmed.split('/').any(|s| s.is_empty() || s == "." || s == "..");
    if bad {
        return Err(GatewayError::BadRequest(format!("invalid checkout path '{path}'")));
    }
    Ok(trimmed.to_string())
}
