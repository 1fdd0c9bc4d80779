//! engine::orchestrator::merge
//!
//! Merge state machine.
//!
//! ```text
//! target ancestor of HEAD          -> ALREADY_UP_TO_DATE
//! HEAD ancestor of target, !squash -> FAST_FORWARD
//! dirty path the merge touches     -> FAILED (nothing attempted)
//! overlapping changes              -> CONFLICTING (markers written)
//! otherwise                        -> MERGED | MERGED_SQUASHED
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::core::types::{BranchName, Oid, RefName};
use crate::engine::error::GatewayError;
use crate::engine::Repo;
use crate::git::{DiffSide, GitError, MergeAnalysis, DEV_NULL};

/// Result of a merge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStatus {
    AlreadyUpToDate,
    FastForward,
    Merged,
    MergedSquashed,
    Conflicting,
    Failed,
}

/// Why a path blocked an operation before it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// Uncommitted working tree changes
    DirtyWorktree,
    /// Staged changes
    DirtyIndex,
    /// A file to delete is a directory on disk
    CouldNotDelete,
}

/// Wire form of a merge result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MergeOutcome {
    pub result: MergeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failing_paths: Option<BTreeMap<String, FailureReason>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicting_paths: Option<Vec<String>>,
}

impl MergeOutcome {
    fn status(result: MergeStatus) -> Self {
        Self {
            result,
            failing_paths: None,
            conflicting_paths: None,
        }
    }
}

/// Merge `target` (a ref or commit) into HEAD.
pub fn merge(repo: &Repo, target: &str, squash: bool) -> Result<MergeOutcome, GatewayError> {
    let _lock = repo.lock()?;
    merge_locked(repo, target, squash)
}

/// [`merge`] for a caller that already holds the repository lock.
pub(crate) fn merge_locked(repo: &Repo, target: &str, squash: bool) -> Result<MergeOutcome, GatewayError> {
    let git = repo.git();
    let state = git.state();
    if state.is_in_progress() {
        return Err(GitError::OperationInProgress {
            operation: state,
        }
        .into());
    }

    let target_oid = git.resolve_commit(target)?;
    let analysis = git.merge_analysis(&target_oid)?;
    tracing::debug!(repository = repo.name(), merge_target = target, ?analysis, squash, "merge requested");

    let head = match analysis {
        MergeAnalysis::UpToDate => return Ok(MergeOutcome::status(MergeStatus::AlreadyUpToDate)),
        MergeAnalysis::Unborn => {
            return Err(GatewayError::Conflict {
                message: "cannot merge into a branch with no commits".into(),
                detail: None,
                paths: Vec::new(),
            })
        }
        MergeAnalysis::FastForward | MergeAnalysis::Normal => git.head_oid()?.ok_or_else(|| {
            GatewayError::Engine("HEAD vanished during merge".into())
        })?,
    };

    let base = git.merge_base(&head, &target_oid)?;
    let failing = failing_paths(repo, base.as_ref(), &target_oid)?;
    if !failing.is_empty() {
        return Ok(MergeOutcome {
            result: MergeStatus::Failed,
            failing_paths: Some(failing),
            conflicting_paths: None,
        });
    }

    if analysis == MergeAnalysis::FastForward && !squash {
        git.fast_forward_to(&target_oid)?;
        return Ok(MergeOutcome::status(MergeStatus::FastForward));
    }

    let conflicts = git.merge_into_worktree(&target_oid, target)?;
    if !conflicts.is_empty() {
        tracing::info!(repository = repo.name(), merge_target = target, conflicts = conflicts.len(), "merge stopped on conflicts");
        return Ok(MergeOutcome {
            result: MergeStatus::Conflicting,
            failing_paths: None,
            conflicting_paths: Some(conflicts),
        });
    }

    if squash {
        // Changes stay staged for the caller to commit.
        git.cleanup_state()?;
        return Ok(MergeOutcome::status(MergeStatus::MergedSquashed));
    }

    let message = merge_message(repo, target);
    let id = git.commit_merge(&target_oid, &message, repo.identity().as_ref())?;
    tracing::info!(repository = repo.name(), merge_target = target, commit = %id, "merged");
    Ok(MergeOutcome::status(MergeStatus::Merged))
}

fn merge_message(repo: &Repo, target: &str) -> String {
    let is_branch = BranchName::new(target)
        .map(|b| repo.git().ref_exists(RefName::for_branch(&b).as_str()))
        .unwrap_or(false);
    if is_branch {
        format!("Merge branch '{target}'")
    } else {
        format!("Merge commit '{target}'")
    }
}

/// Paths the merge would touch that carry local work.
///
/// The touched set is everything that differs between the merge base (or
/// the empty tree) and the target.
pub(crate) fn failing_paths(
    repo: &Repo,
    base: Option<&Oid>,
    target: &Oid,
) -> Result<BTreeMap<String, FailureReason>, GatewayError> {
    let git = repo.git();
    let from = base.cloned().map_or(DiffSide::Empty, DiffSide::Commit);
    let changes = git.diff(&from, &DiffSide::Commit(target.clone()), &[])?;

    let mut touched = BTreeSet::new();
    let mut deleted = BTreeSet::new();
    for change in &changes.files {
        if change.new_path == DEV_NULL {
            deleted.insert(change.old_path.clone());
        }
        for path in [&change.old_path, &change.new_path] {
            if path != DEV_NULL {
                touched.insert(path.clone());
            }
        }
    }

    let mut failing = BTreeMap::new();
    for status in git.path_statuses()? {
        if !touched.contains(&status.path) {
            continue;
        }
        if status.is_staged() || status.conflicted {
            failing.insert(status.path, FailureReason::DirtyIndex);
        } else if status.wt_modified || status.wt_deleted || status.wt_new {
            failing.insert(status.path, FailureReason::DirtyWorktree);
        }
    }

    let work_dir = git.work_dir()?;
    for path in deleted {
        if !failing.contains_key(&path) && work_dir.join(&path).is_dir() {
            failing.insert(path, FailureReason::CouldNotDelete);
        }
    }
    Ok(failing)
}
