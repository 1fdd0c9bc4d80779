//! git::rebase
//!
//! Replaying HEAD's commits onto an upstream, one commit at a time.
//!
//! Rebase progress lives in the repository (`.git/rebase-merge`), so a
//! rebase started by one request can be continued, skipped or aborted by
//! a later one, even after a restart.

use super::interface::{from_git2_oid, to_git2_oid, Git, GitError, Person};
use crate::core::types::Oid;

/// Where a replay loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseProgress {
    /// Every commit was replayed and the branch moved
    Finished,
    /// A commit did not apply cleanly; resolve these paths and continue
    Stopped { paths: Vec<String> },
}

/// On-disk rebase state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseInfo {
    /// Commit the branch is being replayed upon
    pub onto: Oid,
    /// Original commit of the step currently being applied
    pub current_step: Option<Oid>,
}

impl Git {
    /// Start replaying HEAD onto `upstream`.
    pub fn rebase_begin(&self, upstream: &Oid, who: Option<&Person>) -> Result<RebaseProgress, GitError> {
        let upstream = self
            .repo
            .find_annotated_commit(to_git2_oid(upstream)?)
            .map_err(|e| GitError::from_git2(e, upstream.as_str()))?;

        let mut opts = rebase_options();
        let mut rebase = self.repo.rebase(None, Some(&upstream), None, Some(&mut opts))?;
        tracing::debug!(operations = rebase.len(), "rebase started");
        self.drive(&mut rebase, who)
    }

    /// Commit the resolved current step and replay the remaining ones.
    ///
    /// Fails with [`GitError::Unmerged`] while conflicts remain in the index.
    pub fn rebase_continue(&self, who: Option<&Person>) -> Result<RebaseProgress, GitError> {
        let mut opts = rebase_options();
        let mut rebase = self.repo.open_rebase(Some(&mut opts))?;
        if self.has_conflicts()? {
            return Err(GitError::Unmerged);
        }
        if rebase.operation_current().is_some() {
            let sig = self.signature(who)?;
            commit_step(&mut rebase, &sig)?;
        }
        self.drive(&mut rebase, who)
    }

    /// Drop the current step and replay the remaining ones.
    pub fn rebase_skip(&self, who: Option<&Person>) -> Result<RebaseProgress, GitError> {
        let mut opts = rebase_options();
        let mut rebase = self.repo.open_rebase(Some(&mut opts))?;
        self.reset_hard_to_head()?;
        self.drive(&mut rebase, who)
    }

    /// Abandon the rebase and restore the original branch.
    pub fn rebase_abort(&self) -> Result<(), GitError> {
        let mut opts = rebase_options();
        let mut rebase = self.repo.open_rebase(Some(&mut opts))?;
        rebase.abort()?;
        tracing::debug!("rebase aborted");
        Ok(())
    }

    /// Rebase state stored in the repository, if a rebase is in progress.
    pub fn rebase_info(&self) -> Result<Option<RebaseInfo>, GitError> {
        let mut rebase = match self.repo.open_rebase(None) {
            Ok(rebase) => rebase,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let current_step = match rebase.operation_current().and_then(|i| rebase.nth(i)) {
            Some(op) => Some(from_git2_oid(op.id())?),
            None => None,
        };
        Ok(Some(RebaseInfo {
            onto: from_git2_oid(rebase.onto_id())?,
            current_step,
        }))
    }

    fn drive(&self, rebase: &mut git2::Rebase<'_>, who: Option<&Person>) -> Result<RebaseProgress, GitError> {
        let sig = self.signature(who)?;
        while let Some(op) = rebase.next() {
            let op = op?;
            if self.has_conflicts()? {
                let paths = self.conflicted_paths()?;
                tracing::debug!(step = %op.id(), conflicts = paths.len(), "rebase stopped");
                return Ok(RebaseProgress::Stopped { paths });
            }
            commit_step(rebase, &sig)?;
        }
        rebase.finish(Some(&sig))?;
        tracing::debug!("rebase finished");
        Ok(RebaseProgress::Finished)
    }
}

fn rebase_options() -> git2::RebaseOptions<'static> {
    let mut cb = git2::build::CheckoutBuilder::new();
    cb.safe().allow_conflicts(true).conflict_style_merge(true);
    let mut opts = git2::RebaseOptions::new();
    opts.checkout_options(cb);
    opts
}

/// Commit the current step. A step whose changes are already upstream
/// produces no commit.
fn commit_step(rebase: &mut git2::Rebase<'_>, sig: &git2::Signature<'_>) -> Result<(), GitError> {
    match rebase.commit(None, sig, None) {
        Ok(_) => Ok(()),
        Err(e) if e.code() == git2::ErrorCode::Applied => Ok(()),
        Err(e) => Err(e.into()),
    }
}
