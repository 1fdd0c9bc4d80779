//! engine::orchestrator::cherry_pick
//!
//! ```text
//! dirty path the change touches -> FAILED (nothing attempted)
//! overlapping changes           -> CONFLICTING (markers written)
//! change already on HEAD        -> OK, HeadUpdated false
//! otherwise                     -> OK, new commit
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use super::merge::{failing_paths, FailureReason};
use crate::core::types::Oid;
use crate::engine::error::GatewayError;
use crate::engine::Repo;
use crate::git::{CherryPickOutcome as GitPick, GitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CherryPickStatus {
    Ok,
    Failed,
    Conflicting,
}

/// Wire form of a cherry-pick result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CherryPickOutcome {
    pub result: CherryPickStatus,
    /// The new commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Oid>,
    pub head_updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failing_paths: Option<BTreeMap<String, FailureReason>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicting_paths: Option<Vec<String>>,
}

impl CherryPickOutcome {
    fn new(result: CherryPickStatus) -> Self {
        Self {
            result,
            id: None,
            head_updated: false,
            failing_paths: None,
            conflicting_paths: None,
        }
    }
}

/// Apply the change `commit` introduces on top of HEAD.
pub fn cherry_pick(repo: &Repo, commit: &str) -> Result<CherryPickOutcome, GatewayError> {
    let _lock = repo.lock()?;
    let git = repo.git();
    let state = git.state();
    if state.is_in_progress() {
        return Err(GitError::OperationInProgress { operation: state }.into());
    }

    let oid = git.resolve_commit(commit)?;
    let parent = git.commit_info(&oid)?.parents.first().cloned();
    let failing = failing_paths(repo, parent.as_ref(), &oid)?;
    if !failing.is_empty() {
        return Ok(CherryPickOutcome {
            failing_paths: Some(failing),
            ..CherryPickOutcome::new(CherryPickStatus::Failed)
        });
    }

    let outcome = match git.cherry_pick(&oid, repo.identity().as_ref())? {
        GitPick::Committed(id) => {
            tracing::info!(repository = repo.name(), commit, new = %id, "cherry-picked");
            CherryPickOutcome {
                id: Some(id),
                head_updated: true,
                ..CherryPickOutcome::new(CherryPickStatus::Ok)
            }
        }
        GitPick::Empty => CherryPickOutcome::new(CherryPickStatus::Ok),
        GitPick::Conflicting(paths) => {
            tracing::info!(repository = repo.name(), commit, conflicts = paths.len(), "cherry-pick stopped on conflicts");
            CherryPickOutcome {
                conflicting_paths: Some(paths),
                ..CherryPickOutcome::new(CherryPickStatus::Conflicting)
            }
        }
    };
    Ok(outcome)
}
