//! git::diff
//!
//! Differences between any two states of a repository: a commit tree, the
//! empty tree, the index, or the working tree.

use super::interface::{to_git2_oid, Git, GitError};
use crate::core::types::Oid;

/// One side of a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSide {
    /// The tree of a commit
    Commit(Oid),
    /// The empty tree (everything on the other side is an addition)
    Empty,
    /// The staging area
    Index,
    /// Files on disk
    WorkTree,
}

/// Kind of change a file underwent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Modify,
    Delete,
    Rename,
    Copy,
}

/// Placeholder path for the missing side of an add or delete.
pub const DEV_NULL: &str = "/dev/null";

/// One changed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Path on the old side, `/dev/null` for additions
    pub old_path: String,
    /// Path on the new side, `/dev/null` for deletions
    pub new_path: String,
    pub kind: ChangeKind,
}

/// Result of diffing two sides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOutput {
    /// Unified patch text, files in computation order
    pub patch: String,
    /// Changed files in the same order
    pub files: Vec<FileChange>,
}

impl Git {
    /// Diff `old` against `new`, optionally restricted to `filters`.
    ///
    /// Each filter is diffed separately and the results are concatenated in
    /// filter order, so the patch text lists files exactly in the order the
    /// caller named them. A file matched by several filters appears once.
    pub fn diff(&self, old: &DiffSide, new: &DiffSide, filters: &[String]) -> Result<DiffOutput, GitError> {
        if filters.is_empty() {
            return self.diff_one(old, new, None);
        }

        let mut out = DiffOutput::default();
        for filter in filters {
            let part = self.diff_one(old, new, Some(filter))?;
            for (change, text) in part.files.into_iter().zip(split_patch(&part.patch)) {
                if out.files.contains(&change) {
                    continue;
                }
                out.files.push(change);
                out.patch.push_str(text);
            }
        }
        Ok(out)
    }

    fn diff_one(&self, old: &DiffSide, new: &DiffSide, filter: Option<&str>) -> Result<DiffOutput, GitError> {
        let mut opts = git2::DiffOptions::new();
        opts.context_lines(3);
        if let Some(filter) = filter {
            // Paths are literal: `*` or `?` in a file name match only itself.
            opts.pathspec(filter).disable_pathspec_match(true);
        }

        // libgit2 only diffs "older kinds" against "newer kinds"
        // (tree -> index -> workdir), so reversed requests are computed
        // forward and flipped.
        let rank = |side: &DiffSide| match side {
            DiffSide::Commit(_) | DiffSide::Empty => 0,
            DiffSide::Index => 1,
            DiffSide::WorkTree => 2,
        };
        let (from, to) = if rank(old) > rank(new) {
            opts.reverse(true);
            (new, old)
        } else {
            (old, new)
        };

        let mut diff = match (from, to) {
            (DiffSide::Index, DiffSide::Index) | (DiffSide::WorkTree, DiffSide::WorkTree) => {
                return Ok(DiffOutput::default());
            }
            (DiffSide::Index, DiffSide::WorkTree) => {
                let index = self.repo.index()?;
                self.repo.diff_index_to_workdir(Some(&index), Some(&mut opts))?
            }
            (tree_side, DiffSide::Index) => {
                let tree = self.tree_of(tree_side)?;
                let index = self.repo.index()?;
                self.repo
                    .diff_tree_to_index(tree.as_ref(), Some(&index), Some(&mut opts))?
            }
            (tree_side, DiffSide::WorkTree) => {
                let tree = self.tree_of(tree_side)?;
                self.repo
                    .diff_tree_to_workdir_with_index(tree.as_ref(), Some(&mut opts))?
            }
            (a, b) => {
                let old_tree = self.tree_of(a)?;
                let new_tree = self.tree_of(b)?;
                self.repo
                    .diff_tree_to_tree(old_tree.as_ref(), new_tree.as_ref(), Some(&mut opts))?
            }
        };

        let mut find = git2::DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))?;
        render(&diff)
    }

    fn tree_of(&self, side: &DiffSide) -> Result<Option<git2::Tree<'_>>, GitError> {
        match side {
            DiffSide::Commit(oid) => {
                let commit = self
                    .repo
                    .find_commit(to_git2_oid(oid)?)
                    .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
                Ok(Some(commit.tree()?))
            }
            _ => Ok(None),
        }
    }
}

fn render(diff: &git2::Diff<'_>) -> Result<DiffOutput, GitError> {
    let mut files = Vec::new();
    for delta in diff.deltas() {
        let kind = match delta.status() {
            git2::Delta::Added | git2::Delta::Untracked => ChangeKind::Add,
            git2::Delta::Deleted => ChangeKind::Delete,
            git2::Delta::Renamed => ChangeKind::Rename,
            git2::Delta::Copied => ChangeKind::Copy,
            _ => ChangeKind::Modify,
        };
        let path_of = |f: git2::DiffFile<'_>| {
            f.path()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default()
        };
        let (old_path, new_path) = match kind {
            ChangeKind::Add => (DEV_NULL.to_string(), path_of(delta.new_file())),
            ChangeKind::Delete => (path_of(delta.old_file()), DEV_NULL.to_string()),
            _ => (path_of(delta.old_file()), path_of(delta.new_file())),
        };
        files.push(FileChange {
            old_path,
            new_path,
            kind,
        });
    }

    let mut patch = Vec::new();
    diff.print(git2::DiffFormat::Patch, |_, _, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            patch.push(line.origin() as u8);
        }
        patch.extend_from_slice(line.content());
        true
    })?;

    Ok(DiffOutput {
        patch: String::from_utf8_lossy(&patch).into_owned(),
        files,
    })
}

/// Split patch text into per-file chunks, each starting at `diff --git`.
fn split_patch(patch: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = patch
        .match_indices("diff --git ")
        .map(|(i, _)| i)
        .filter(|&i| i == 0 || patch.as_bytes()[i - 1] == b'\n')
        .collect();
    starts.push(patch.len());
    starts.windows(2).map(|w| &patch[w[0]..w[1]]).collect()
}
