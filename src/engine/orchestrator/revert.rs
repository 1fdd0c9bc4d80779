//! engine::orchestrator::revert
//!
//! Revert either commits or leaves the repository untouched.

use serde::Serialize;

use crate::core::types::Oid;
use crate::engine::error::GatewayError;
use crate::engine::Repo;
use crate::git::RevertOutcome as GitRevert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevertStatus {
    Ok,
    Failure,
}

/// Wire form of a revert result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RevertOutcome {
    pub result: RevertStatus,
    /// The revert commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Oid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failing_paths: Option<Vec<String>>,
}

/// Revert `commit` on top of HEAD.
pub fn revert(repo: &Repo, commit: &str) -> Result<RevertOutcome, GatewayError> {
    let _lock = repo.lock()?;
    let git = repo.git();
    let oid = git.resolve_commit(commit)?;
    let outcome = match git.revert(&oid, repo.identity().as_ref())? {
        GitRevert::Committed(id) => RevertOutcome {
            result: RevertStatus::Ok,
            id: Some(id),
            failing_paths: None,
        },
        GitRevert::Blocked { paths } => {
            tracing::info!(repository = repo.name(), commit, paths = paths.len(), "revert blocked");
            RevertOutcome {
                result: RevertStatus::Failure,
                id: None,
                failing_paths: Some(paths),
            }
        }
    };
    Ok(outcome)
}
