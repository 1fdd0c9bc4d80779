//! git::stash
//!
//! Saving, listing, applying and dropping stashed changes.
//!
//! libgit2's stash calls need a mutable repository, so each of them runs
//! on a second handle opened on the same working directory.

use super::interface::{from_git2_oid, Git, GitError, Person};
use crate::core::types::Oid;

/// One entry of the stash, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashEntry {
    /// Position in the stash (`stash@{index}`)
    pub index: usize,
    pub message: String,
    /// The stash commit
    pub id: Oid,
}

/// What a stash save captures.
#[derive(Debug, Clone, Default)]
pub struct StashRequest {
    /// Entry message; git's `WIP on <branch>` form when absent
    pub message: Option<String>,
    pub include_untracked: bool,
}

impl Git {
    fn stash_handle(&self) -> Result<git2::Repository, GitError> {
        let dir = self.work_dir()?;
        git2::Repository::open(dir).map_err(|_| GitError::NotARepo {
            path: dir.to_path_buf(),
        })
    }

    /// Stash entries, newest first.
    pub fn stash_list(&self) -> Result<Vec<StashEntry>, GitError> {
        let mut repo = self.stash_handle()?;
        let mut raw = Vec::new();
        repo.stash_foreach(|index, message, id| {
            raw.push((index, message.to_string(), *id));
            true
        })?;
        raw.into_iter()
            .map(|(index, message, id)| {
                Ok(StashEntry {
                    index,
                    message,
                    id: from_git2_oid(id)?,
                })
            })
            .collect()
    }

    /// Stash local changes and reset the working tree to HEAD.
    ///
    /// Returns `None` when there is nothing to stash.
    pub fn stash_save(&self, request: &StashRequest, who: Option<&Person>) -> Result<Option<Oid>, GitError> {
        let stasher = self.signature(who)?;
        let mut flags = git2::StashFlags::DEFAULT;
        if request.include_untracked {
            flags |= git2::StashFlags::INCLUDE_UNTRACKED;
        }
        let mut repo = self.stash_handle()?;
        match repo.stash_save2(&stasher, request.message.as_deref(), Some(flags)) {
            Ok(id) => {
                let id = from_git2_oid(id)?;
                tracing::debug!(stash = %id, "stashed changes");
                Ok(Some(id))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, "stash")),
        }
    }

    /// Apply entry `index` to the working tree, optionally restoring what
    /// was staged and dropping the entry afterwards.
    ///
    /// Local changes the entry would overwrite fail with
    /// [`GitError::CheckoutConflict`] and nothing is applied.
    pub fn stash_apply(&self, index: usize, restore_index: bool, drop: bool) -> Result<(), GitError> {
        let mut opts = git2::StashApplyOptions::new();
        if restore_index {
            opts.reinstantiate_index();
        }
        let mut repo = self.stash_handle()?;
        let context = format!("stash@{{{index}}}");
        let applied = if drop {
            repo.stash_pop(index, Some(&mut opts))
        } else {
            repo.stash_apply(index, Some(&mut opts))
        };
        applied.map_err(|e| GitError::from_git2(e, &context))?;
        tracing::debug!(index, restore_index, drop, "applied stash");
        Ok(())
    }

    /// Remove entry `index` without applying it.
    pub fn stash_drop(&self, index: usize) -> Result<(), GitError> {
        let mut repo = self.stash_handle()?;
        let context = format!("stash@{{{index}}}");
        repo.stash_drop(index).map_err(|e| GitError::from_git2(e, &context))?;
        Ok(())
    }
}
