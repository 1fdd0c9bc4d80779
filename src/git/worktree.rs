//! git::worktree
//!
//! Working tree and index: per-path status flags, path and branch
//! checkout, staging, reset.

use std::path::Path;

use super::interface::{to_git2_oid, Git, GitError, GitState};
use crate::core::types::{BranchName, Oid, RefName};

/// How far a reset reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Move the branch only
    Soft,
    /// Move the branch and reset the index
    Mixed,
    /// Move the branch, reset the index and the working tree
    Hard,
}

/// Raw per-path status as reported by git, before any classification.
///
/// Several flags can be set for one path (e.g. staged as new and then
/// modified again in the working tree).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathStatus {
    /// Repository-relative path
    pub path: String,
    /// Present in the index but not in HEAD
    pub index_new: bool,
    /// Index content differs from HEAD
    pub index_modified: bool,
    /// Present in HEAD but not in the index
    pub index_deleted: bool,
    /// Not tracked
    pub wt_new: bool,
    /// Working tree content differs from the index
    pub wt_modified: bool,
    /// Tracked but missing from the working tree
    pub wt_deleted: bool,
    /// Unresolved merge conflict
    pub conflicted: bool,
}

impl PathStatus {
    /// Anything staged for this path.
    pub fn is_staged(&self) -> bool {
        self.index_new || self.index_modified || self.index_deleted
    }

    /// Uncommitted work on a tracked path (ignores untracked files).
    pub fn is_tracked_change(&self) -> bool {
        self.is_staged() || self.wt_modified || self.wt_deleted || self.conflicted
    }
}

impl Git {
    // =========================================================================
    // Status
    // =========================================================================

    /// Status flags for every path that is not clean, sorted by path.
    ///
    /// Reading status never modifies the repository (the index is not
    /// refreshed on disk).
    pub fn path_statuses(&self) -> Result<Vec<PathStatus>, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .renames_head_to_index(false)
            .no_refresh(true)
            .update_index(false);

        let statuses = self.repo.statuses(Some(&mut opts))?;
        let mut out = Vec::with_capacity(statuses.len());
        for entry in statuses.iter() {
            let s = entry.status();
            let path = String::from_utf8_lossy(entry.path_bytes()).into_owned();
            out.push(PathStatus {
                path,
                index_new: s.is_index_new(),
                index_modified: s.is_index_modified() || s.is_index_typechange(),
                index_deleted: s.is_index_deleted(),
                wt_new: s.is_wt_new(),
                wt_modified: s.is_wt_modified() || s.is_wt_typechange(),
                wt_deleted: s.is_wt_deleted(),
                conflicted: s.is_conflicted(),
            });
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }

    /// Whether `path` exists in the working tree as a regular file.
    pub fn is_plain_file(&self, path: &str) -> Result<bool, GitError> {
        Ok(self.work_dir()?.join(path).is_file())
    }

    /// Whether `path` is tracked in the index (exactly, or as a folder prefix).
    pub fn is_tracked(&self, path: &str) -> Result<bool, GitError> {
        let index = self.repo.index()?;
        if index.get_path(Path::new(path), 0).is_some() {
            return Ok(true);
        }
        let folder = format!("{}/", path.trim_end_matches('/'));
        Ok(index
            .iter()
            .any(|e| String::from_utf8_lossy(&e.path).starts_with(&folder)))
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Restore working tree content of `paths` from the index.
    ///
    /// Paths that exist neither in the index nor on disk are skipped.
    /// Untracked paths are left alone unless `remove_untracked` is set, in
    /// which case they are deleted.
    pub fn checkout_paths(&self, paths: &[String], remove_untracked: bool) -> Result<(), GitError> {
        let work_dir = self.work_dir()?.to_path_buf();

        let mut tracked = Vec::new();
        for path in paths {
            if self.is_tracked(path)? {
                tracked.push(path.as_str());
            } else if remove_untracked {
                let target = work_dir.join(path);
                let result = if target.is_dir() {
                    std::fs::remove_dir_all(&target)
                } else if target.exists() {
                    std::fs::remove_file(&target)
                } else {
                    Ok(())
                };
                result.map_err(|e| GitError::AccessError {
                    message: format!("cannot remove {path}: {e}"),
                })?;
            }
        }

        if tracked.is_empty() {
            return Ok(());
        }

        let mut cb = git2::build::CheckoutBuilder::new();
        cb.force().update_index(false);
        for path in &tracked {
            cb.path(*path);
        }
        if remove_untracked {
            cb.remove_untracked(true);
        }
        self.repo.checkout_index(None, Some(&mut cb))?;
        Ok(())
    }

    /// Switch HEAD to a local branch.
    ///
    /// When no local branch `name` exists but `<remote>/<name>` does, a
    /// local branch tracking it is created first. If uncommitted changes
    /// would be overwritten nothing is touched and the colliding paths are
    /// returned in [`GitError::CheckoutConflict`].
    pub fn checkout_branch(&self, name: &BranchName, remote: &str) -> Result<(), GitError> {
        let local = RefName::for_branch(name);
        if !self.ref_exists(local.as_str()) {
            self.create_tracking_branch(name, remote)?;
        }

        let target = self
            .repo
            .revparse_single(local.as_str())
            .map_err(|e| GitError::from_git2(e, local.as_str()))?;

        let mut colliding: Vec<String> = Vec::new();
        let result = {
            let mut cb = git2::build::CheckoutBuilder::new();
            cb.safe()
                .notify_on(git2::CheckoutNotificationType::CONFLICT)
                .notify(|_, path, _, _, _| {
                    if let Some(p) = path {
                        colliding.push(p.to_string_lossy().replace('\\', "/"));
                    }
                    true
                });
            self.repo.checkout_tree(&target, Some(&mut cb))
        };

        match result {
            Ok(()) if colliding.is_empty() => {}
            Ok(()) => return Err(GitError::CheckoutConflict { paths: colliding }),
            Err(e) if e.code() == git2::ErrorCode::Conflict => {
                colliding.sort();
                colliding.dedup();
                return Err(GitError::CheckoutConflict { paths: colliding });
            }
            Err(e) => return Err(GitError::from_git2(e, local.as_str())),
        }

        self.repo
            .set_head(local.as_str())
            .map_err(|e| GitError::from_git2(e, local.as_str()))?;
        tracing::debug!(branch = %name, "checked out branch");
        Ok(())
    }

    fn create_tracking_branch(&self, name: &BranchName, remote: &str) -> Result<(), GitError> {
        let remote_ref = RefName::for_remote_branch(remote, name)?;
        let commit = self
            .repo
            .find_reference(remote_ref.as_str())
            .and_then(|r| r.peel_to_commit())
            .map_err(|_| GitError::RefNotFound {
                refname: name.to_string(),
            })?;

        let mut branch = self.repo.branch(name.as_str(), &commit, false)?;
        branch.set_upstream(Some(&format!("{remote}/{name}")))?;
        tracing::debug!(branch = %name, remote, "created tracking branch");
        Ok(())
    }

    // =========================================================================
    // Index
    // =========================================================================

    /// Stage `path` (a file or folder, `""` for everything). Deleted files
    /// are removed from the index.
    pub fn stage(&self, path: &str) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        let on_disk = self.work_dir()?.join(path);
        if path.is_empty() || on_disk.is_dir() {
            let spec = if path.is_empty() { "*" } else { path };
            index.add_all([spec], git2::IndexAddOption::DEFAULT, None)?;
            index.update_all([spec], None)?;
        } else if on_disk.is_file() {
            index.add_path(Path::new(path))?;
        } else if self.is_tracked(path)? {
            index.remove_all([path], None)?;
        } else {
            return Err(GitError::PathNotFound {
                path: path.to_string(),
            });
        }
        index.write()?;
        Ok(())
    }

    /// Reset the index entry of `path` (`""` for everything) to HEAD, or
    /// drop it while HEAD is unborn.
    pub fn unstage(&self, path: &str) -> Result<(), GitError> {
        let spec = if path.is_empty() { "*" } else { path };
        match self.repo.head().and_then(|h| h.peel(git2::ObjectType::Commit)) {
            Ok(head) => self.repo.reset_default(Some(&head), [spec])?,
            Err(_) => {
                let mut index = self.repo.index()?;
                index.remove_all([spec], None)?;
                index.write()?;
            }
        }
        Ok(())
    }

    /// Content staged for `path`.
    pub fn index_blob(&self, path: &str) -> Result<Vec<u8>, GitError> {
        let index = self.repo.index()?;
        let entry = index
            .get_path(Path::new(path), 0)
            .ok_or_else(|| GitError::PathNotFound {
                path: path.to_string(),
            })?;
        let blob = self.repo.find_blob(entry.id)?;
        Ok(blob.content().to_vec())
    }

    /// Move the current branch (or detached HEAD) to `target`.
    ///
    /// Untracked files survive a hard reset. A mixed or hard reset also
    /// drops a stopped merge, revert or cherry-pick.
    pub fn reset(&self, target: &Oid, mode: ResetMode) -> Result<(), GitError> {
        let commit = self
            .repo
            .find_commit(to_git2_oid(target)?)
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;
        let kind = match mode {
            ResetMode::Soft => git2::ResetType::Soft,
            ResetMode::Mixed => git2::ResetType::Mixed,
            ResetMode::Hard => git2::ResetType::Hard,
        };
        self.repo
            .reset(commit.as_object(), kind, None)
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;
        let stopped = matches!(self.state(), GitState::Merge | GitState::Revert | GitState::CherryPick);
        if mode != ResetMode::Soft && stopped {
            self.repo.cleanup_state()?;
        }
        tracing::debug!(to = %target, ?mode, "reset HEAD");
        Ok(())
    }

    /// Hard-reset index and working tree to HEAD.
    pub(super) fn reset_hard_to_head(&self) -> Result<(), GitError> {
        let head = self.repo.head()?.peel(git2::ObjectType::Commit)?;
        self.repo.reset(&head, git2::ResetType::Hard, None)?;
        Ok(())
    }
}
