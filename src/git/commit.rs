//! git::commit
//!
//! Recording the index as a new commit on HEAD, optionally amending.

use super::interface::{from_git2_oid, to_git2_oid, Git, GitError, GitState, Person};
use crate::core::types::Oid;

/// What to commit.
#[derive(Debug, Clone, Default)]
pub struct CommitRequest {
    pub message: String,
    /// Replace the HEAD commit instead of adding a child
    pub amend: bool,
    /// Explicit author (defaults to the committer)
    pub author: Option<Person>,
    /// Explicit committer (defaults to the repository identity)
    pub committer: Option<Person>,
}

impl Git {
    /// Commit the current index on top of HEAD.
    ///
    /// With `amend` the HEAD commit is rewritten in place: same parents,
    /// new tree and message. Amending an unborn HEAD is a
    /// [`GitError::RefNotFound`].
    ///
    /// Committing a resolved merge records `MERGE_HEAD` as second parent.
    /// A stopped merge, revert or cherry-pick ends with the commit.
    pub fn commit(&self, request: &CommitRequest) -> Result<Oid, GitError> {
        let committer = self.signature(request.committer.as_ref())?;
        let author = match &request.author {
            Some(who) => self.signature(Some(who))?,
            None => committer.clone(),
        };

        let mut index = self.repo.index()?;
        if index.has_conflicts() {
            return Err(GitError::Unmerged);
        }
        let tree = self.repo.find_tree(index.write_tree()?)?;

        if request.amend {
            let head = self
                .repo
                .head()
                .and_then(|h| h.peel_to_commit())
                .map_err(|e| GitError::from_git2(e, "HEAD"))?;
            let id = head.amend(
                Some("HEAD"),
                Some(&author),
                Some(&committer),
                None,
                Some(&request.message),
                Some(&tree),
            )?;
            tracing::debug!(commit = %id, "amended HEAD");
            return from_git2_oid(id);
        }

        let state = self.state();
        let mut parents = match self.head_oid()? {
            Some(head) => vec![head],
            None => Vec::new(),
        };
        if state == GitState::Merge {
            parents.extend(self.try_resolve_commit("MERGE_HEAD")?);
        }
        let id = self.commit_tree(&tree, &request.message, &parents, &author, &committer)?;
        if matches!(state, GitState::Merge | GitState::Revert | GitState::CherryPick) {
            self.cleanup_state()?;
        }
        Ok(id)
    }

    /// Write `tree` as a commit with `parents` and move HEAD to it.
    ///
    /// The first parent must be the current HEAD (or `parents` empty while
    /// HEAD is unborn).
    pub(super) fn commit_tree(
        &self,
        tree: &git2::Tree<'_>,
        message: &str,
        parents: &[Oid],
        author: &git2::Signature<'_>,
        committer: &git2::Signature<'_>,
    ) -> Result<Oid, GitError> {
        let parents = parents
            .iter()
            .map(|p| {
                self.repo
                    .find_commit(to_git2_oid(p)?)
                    .map_err(|e| GitError::from_git2(e, p.as_str()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

        let id = self
            .repo
            .commit(Some("HEAD"), author, committer, message, tree, &parent_refs)?;
        tracing::debug!(commit = %id, parents = parent_refs.len(), "created commit");
        from_git2_oid(id)
    }

    /// Commit the current index with `parents` on behalf of `who`.
    pub(super) fn commit_index(
        &self,
        message: &str,
        parents: &[Oid],
        who: Option<&Person>,
    ) -> Result<Oid, GitError> {
        let sig = self.signature(who)?;
        let mut index = self.repo.index()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;
        self.commit_tree(&tree, message, parents, &sig, &sig)
    }
}
