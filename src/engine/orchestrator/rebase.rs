//! engine::orchestrator::rebase
//!
//! Rebase state machine.
//!
//! A rebase spans requests: `BEGIN` may stop on a conflict, after which a
//! later request resolves it with `CONTINUE`, `SKIP` or `ABORT`. The state
//! lives in the repository itself, and every request holds the
//! repository lock while reading or changing it, so two concurrent
//! `CONTINUE`s cannot both apply the same step.
//!
//! ```text
//!            BEGIN
//!   NONE ------------> IN_PROGRESS --CONTINUE/SKIP--> (OK | STOPPED)
//!     ^                     |
//!     +------- ABORT -------+
//! ```
//!
//! `CONTINUE`/`SKIP`/`ABORT` without a rebase in progress answer
//! `FAILED_WRONG_REPOSITORY_STATE`; `CONTINUE` with unresolved conflicts
//! answers `FAILED_UNMERGED_PATHS`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::merge::FailureReason;
use crate::core::types::Oid;
use crate::engine::error::GatewayError;
use crate::engine::Repo;
use crate::git::{GitError, GitState, MergeAnalysis, RebaseProgress};

/// Requested rebase step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebaseOperation {
    #[default]
    Begin,
    Continue,
    Skip,
    Abort,
}

/// Result of a rebase request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebaseStatus {
    UpToDate,
    FastForward,
    Ok,
    Stopped,
    Aborted,
    Failed,
    FailedUnmergedPaths,
    FailedWrongRepositoryState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebaseStateOperation {
    None,
    InProgress,
}

/// The persistent rebase state, as last read from the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RebaseState {
    pub operation: RebaseStateOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upon_commit: Option<Oid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step_commit: Option<Oid>,
}

/// Wire form of a rebase result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RebaseOutcome {
    pub result: RebaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicting_paths: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failing_paths: Option<BTreeMap<String, FailureReason>>,
    pub rebase_state: RebaseState,
}

/// Read the rebase state stored in the repository.
pub fn rebase_state(repo: &Repo) -> Result<RebaseState, GatewayError> {
    Ok(match repo.git().rebase_info()? {
        Some(info) => RebaseState {
            operation: RebaseStateOperation::InProgress,
            upon_commit: Some(info.onto),
            current_step_commit: info.current_step,
        },
        None => RebaseState {
            operation: RebaseStateOperation::None,
            upon_commit: None,
            current_step_commit: None,
        },
    })
}

/// Run one rebase request. `upstream` is required for `BEGIN` only.
pub fn rebase(repo: &Repo, upstream: Option<&str>, operation: RebaseOperation) -> Result<RebaseOutcome, GatewayError> {
    let _lock = repo.lock()?;
    let git = repo.git();
    let in_progress = git.rebase_info()?.is_some();
    tracing::debug!(repository = repo.name(), ?operation, in_progress, "rebase requested");

    let step = match operation {
        RebaseOperation::Begin if in_progress || git.state() != GitState::Clean => {
            Step::status(RebaseStatus::FailedWrongRepositoryState)
        }
        RebaseOperation::Begin => {
            let upstream = upstream
                .filter(|u| !u.is_empty())
                .ok_or_else(|| GatewayError::BadRequest("Rebase must name an upstream".into()))?;
            begin(repo, upstream)?
        }
        _ if !in_progress => Step::status(RebaseStatus::FailedWrongRepositoryState),
        RebaseOperation::Continue => match git.rebase_continue(repo.identity().as_ref()) {
            Ok(progress) => Step::progress(progress),
            Err(GitError::Unmerged) => Step {
                result: RebaseStatus::FailedUnmergedPaths,
                conflicting_paths: Some(git.conflicted_paths()?),
                failing_paths: None,
            },
            Err(e) => return Err(e.into()),
        },
        RebaseOperation::Skip => Step::progress(git.rebase_skip(repo.identity().as_ref())?),
        RebaseOperation::Abort => {
            git.rebase_abort()?;
            Step::status(RebaseStatus::Aborted)
        }
    };

    tracing::info!(repository = repo.name(), ?operation, result = ?step.result, "rebase step done");
    Ok(RebaseOutcome {
        result: step.result,
        conflicting_paths: step.conflicting_paths,
        failing_paths: step.failing_paths,
        rebase_state: rebase_state(repo)?,
    })
}

struct Step {
    result: RebaseStatus,
    conflicting_paths: Option<Vec<String>>,
    failing_paths: Option<BTreeMap<String, FailureReason>>,
}

impl Step {
    fn status(result: RebaseStatus) -> Self {
        Self {
            result,
            conflicting_paths: None,
            failing_paths: None,
        }
    }

    fn progress(progress: RebaseProgress) -> Self {
        match progress {
            RebaseProgress::Finished => Self::status(RebaseStatus::Ok),
            RebaseProgress::Stopped { paths } => Self {
                result: RebaseStatus::Stopped,
                conflicting_paths: Some(paths),
                failing_paths: None,
            },
        }
    }
}

fn begin(repo: &Repo, upstream: &str) -> Result<Step, GatewayError> {
    let git = repo.git();
    let target = git.resolve_commit(upstream)?;

    match git.merge_analysis(&target)? {
        MergeAnalysis::UpToDate => return Ok(Step::status(RebaseStatus::UpToDate)),
        MergeAnalysis::Unborn => {
            return Err(GatewayError::Conflict {
                message: "cannot rebase a branch with no commits".into(),
                detail: None,
                paths: Vec::new(),
            })
        }
        MergeAnalysis::FastForward | MergeAnalysis::Normal => {}
    }

    // Replay requires a clean tree: any tracked change blocks the start.
    let mut failing = BTreeMap::new();
    for status in git.path_statuses()? {
        if status.is_staged() || status.conflicted {
            failing.insert(status.path, FailureReason::DirtyIndex);
        } else if status.wt_modified || status.wt_deleted {
            failing.insert(status.path, FailureReason::DirtyWorktree);
        }
    }
    if !failing.is_empty() {
        return Ok(Step {
            result: RebaseStatus::Failed,
            conflicting_paths: None,
            failing_paths: Some(failing),
        });
    }

    if git.merge_analysis(&target)? == MergeAnalysis::FastForward {
        git.fast_forward_to(&target)?;
        return Ok(Step::status(RebaseStatus::FastForward));
    }
    Ok(Step::progress(git.rebase_begin(&target, repo.identity().as_ref())?))
}
