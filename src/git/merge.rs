//! git::merge
//!
//! Merge, fast-forward, revert and cherry-pick primitives. Deciding which of them to
//! run, and how to report the outcome, is the orchestrator's job; these
//! functions only move the repository.

use super::interface::{to_git2_oid, Git, GitError, Person};
use crate::core::types::Oid;

/// Relationship between HEAD and a merge target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAnalysis {
    /// Target is already reachable from HEAD
    UpToDate,
    /// HEAD is reachable from target
    FastForward,
    /// Histories diverged; a content merge is needed
    Normal,
    /// HEAD has no commit yet
    Unborn,
}

/// Result of a revert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertOutcome {
    /// A revert commit was created
    Committed(Oid),
    /// Nothing was committed; these paths blocked the revert
    Blocked { paths: Vec<String> },
}

/// Result of a cherry-pick attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CherryPickOutcome {
    /// The change was committed on HEAD
    Committed(Oid),
    /// The change is already on HEAD; nothing was committed
    Empty,
    /// Markers were written for these paths and the repository is left
    /// cherry-picking
    Conflicting(Vec<String>),
}

impl Git {
    /// Classify how `target` relates to HEAD.
    pub fn merge_analysis(&self, target: &Oid) -> Result<MergeAnalysis, GitError> {
        let Some(head) = self.head_oid()? else {
            return Ok(MergeAnalysis::Unborn);
        };
        if self.is_ancestor(target, &head)? {
            Ok(MergeAnalysis::UpToDate)
        } else if self.is_ancestor(&head, target)? {
            Ok(MergeAnalysis::FastForward)
        } else {
            Ok(MergeAnalysis::Normal)
        }
    }

    /// Move HEAD (and the branch it points to) forward to `target`.
    ///
    /// The working tree is updated with a safe checkout, so local
    /// modifications to paths the target touches fail with
    /// [`GitError::CheckoutConflict`] and nothing moves.
    pub fn fast_forward_to(&self, target: &Oid) -> Result<(), GitError> {
        let commit = self
            .repo
            .find_commit(to_git2_oid(target)?)
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;

        let mut cb = git2::build::CheckoutBuilder::new();
        cb.safe();
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut cb))
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;

        let head = self.repo.head()?;
        let message = format!("fast-forward to {}", target.short(7));
        if head.is_branch() {
            let name = head
                .name()
                .ok_or_else(|| GitError::InvalidRefName {
                    message: "HEAD branch name is not UTF-8".into(),
                })?
                .to_string();
            self.repo
                .reference(&name, commit.id(), true, &message)
                .map_err(|e| GitError::from_git2(e, &name))?;
        } else {
            self.repo.set_head_detached(commit.id())?;
        }
        tracing::debug!(to = %target, "fast-forwarded HEAD");
        Ok(())
    }

    /// Merge `target` into the index and working tree without committing.
    ///
    /// Conflicts are written into the working tree with `HEAD` and `label`
    /// as the marker labels and returned as a sorted path list. The
    /// repository is left in the merging state either way; the caller
    /// commits or cleans up.
    pub fn merge_into_worktree(&self, target: &Oid, label: &str) -> Result<Vec<String>, GitError> {
        let annotated = self
            .repo
            .find_annotated_commit(to_git2_oid(target)?)
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;

        let mut merge_opts = git2::MergeOptions::new();
        merge_opts.fail_on_conflict(false);

        let mut cb = git2::build::CheckoutBuilder::new();
        cb.safe()
            .allow_conflicts(true)
            .conflict_style_merge(true)
            .our_label("HEAD")
            .their_label(label);

        self.repo
            .merge(&[&annotated], Some(&mut merge_opts), Some(&mut cb))
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;

        self.conflicted_paths()
    }

    /// Record the merge of `target` as a two-parent commit on HEAD.
    pub fn commit_merge(&self, target: &Oid, message: &str, who: Option<&Person>) -> Result<Oid, GitError> {
        let head = self.head_oid()?.ok_or_else(|| GitError::RefNotFound {
            refname: "HEAD".into(),
        })?;
        let id = self.commit_index(message, &[head, target.clone()], who)?;
        self.cleanup_state()?;
        Ok(id)
    }

    /// Drop merge/revert bookkeeping (`MERGE_HEAD` and friends).
    pub fn cleanup_state(&self) -> Result<(), GitError> {
        self.repo.cleanup_state()?;
        Ok(())
    }

    // =========================================================================
    // Revert
    // =========================================================================

    /// Revert `oid` on top of HEAD.
    ///
    /// The reverse change is computed in memory first. If it conflicts with
    /// HEAD, or a path it touches already has uncommitted changes, the
    /// repository is left untouched and the offending paths are returned.
    pub fn revert(&self, oid: &Oid, who: Option<&Person>) -> Result<RevertOutcome, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2_oid(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        let head_oid = self.head_oid()?.ok_or_else(|| GitError::RefNotFound {
            refname: "HEAD".into(),
        })?;
        let head = self.repo.find_commit(to_git2_oid(&head_oid)?)?;

        let mainline = if commit.parent_count() > 1 { 1 } else { 0 };
        let mut reverted = self.repo.revert_commit(&commit, &head, mainline, None)?;
        if reverted.has_conflicts() {
            let mut paths = Vec::new();
            for conflict in reverted.conflicts()? {
                let conflict = conflict?;
                if let Some(entry) = conflict.our.or(conflict.their).or(conflict.ancestor) {
                    paths.push(String::from_utf8_lossy(&entry.path).into_owned());
                }
            }
            paths.sort();
            paths.dedup();
            return Ok(RevertOutcome::Blocked { paths });
        }

        let touched = self.paths_touched_by(&commit)?;
        let dirty: Vec<String> = self
            .path_statuses()?
            .into_iter()
            .filter(|s| s.is_tracked_change() && touched.contains(&s.path))
            .map(|s| s.path)
            .collect();
        if !dirty.is_empty() {
            return Ok(RevertOutcome::Blocked { paths: dirty });
        }

        let tree = self.repo.find_tree(reverted.write_tree_to(&self.repo)?)?;
        let mut cb = git2::build::CheckoutBuilder::new();
        cb.safe();
        self.repo
            .checkout_tree(tree.as_object(), Some(&mut cb))
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;

        let summary = commit.summary().unwrap_or_default();
        let message = format!("Revert \"{summary}\"\n\nThis reverts commit {}.\n", commit.id());
        let sig = self.signature(who)?;
        let id = self.commit_tree(&tree, &message, &[head_oid], &sig, &sig)?;
        tracing::debug!(reverted = %oid, commit = %id, "created revert commit");
        Ok(RevertOutcome::Committed(id))
    }

    // =========================================================================
    // Cherry-pick
    // =========================================================================

    /// Apply the change `oid` introduces on top of HEAD.
    ///
    /// The new commit keeps the original author and message. Merge commits
    /// are replayed against their first parent.
    pub fn cherry_pick(&self, oid: &Oid, who: Option<&Person>) -> Result<CherryPickOutcome, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2_oid(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        let head_oid = self.head_oid()?.ok_or_else(|| GitError::RefNotFound {
            refname: "HEAD".into(),
        })?;

        let mut cb = git2::build::CheckoutBuilder::new();
        let label = oid.short(7).to_string();
        cb.safe()
            .allow_conflicts(true)
            .conflict_style_merge(true)
            .our_label("HEAD")
            .their_label(&label);
        let mut opts = git2::CherrypickOptions::new();
        if commit.parent_count() > 1 {
            opts.mainline(1);
        }
        opts.checkout_builder(cb);
        self.repo
            .cherrypick(&commit, Some(&mut opts))
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;

        let conflicts = self.conflicted_paths()?;
        if !conflicts.is_empty() {
            tracing::debug!(picked = %oid, conflicts = conflicts.len(), "cherry-pick stopped");
            return Ok(CherryPickOutcome::Conflicting(conflicts));
        }

        let mut index = self.repo.index()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;
        let head_tree = self.repo.find_commit(to_git2_oid(&head_oid)?)?.tree()?;
        if tree.id() == head_tree.id() {
            self.cleanup_state()?;
            return Ok(CherryPickOutcome::Empty);
        }

        let message = String::from_utf8_lossy(commit.message_bytes()).into_owned();
        let committer = self.signature(who)?;
        let id = self.commit_tree(&tree, &message, &[head_oid], &commit.author(), &committer)?;
        self.cleanup_state()?;
        tracing::debug!(picked = %oid, commit = %id, "cherry-picked");
        Ok(CherryPickOutcome::Committed(id))
    }

    fn paths_touched_by(&self, commit: &git2::Commit<'_>) -> Result<Vec<String>, GitError> {
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };
        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit.tree()?), None)?;
        let mut paths = Vec::new();
        for delta in diff.deltas() {
            for file in [delta.old_file(), delta.new_file()] {
                if let Some(p) = file.path() {
                    let p = p.to_string_lossy().replace('\\', "/");
                    if !paths.contains(&p) {
                        paths.push(p);
                    }
                }
            }
        }
        Ok(paths)
    }
}
