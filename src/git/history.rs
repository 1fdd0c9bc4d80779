//! git::history
//!
//! Commit walks, blame, historic file content and branch/tag annotations.

use std::collections::HashMap;
use std::path::Path;

use super::interface::{commit_info_of, from_git2_oid, person_of, to_git2_oid, CommitInfo, Git, GitError, Person};
use crate::core::types::{Oid, UtcTimestamp};

/// Which commits a walk visits.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Walk starts (commits reachable from any of these)
    pub include: Vec<Oid>,
    /// Commits reachable from these are hidden
    pub exclude: Vec<Oid>,
    /// Only commits that changed this file or folder
    pub path: Option<String>,
    /// Matching commits to pass over before collecting
    pub skip: usize,
    /// Maximum number of commits to return
    pub limit: usize,
}

/// One blame region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlameHunk {
    pub commit: Oid,
    pub author: Person,
    pub time: UtcTimestamp,
    /// 1-based first line
    pub start_line: usize,
    /// 1-based last line (inclusive)
    pub end_line: usize,
}

/// Branch and tag names pointing at one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefLabels {
    /// Local and remote-tracking branch short names
    pub branches: Vec<String>,
    pub tags: Vec<String>,
}

impl Git {
    /// Walk history newest first (committer time, then topology).
    pub fn log(&self, query: &LogQuery) -> Result<Vec<CommitInfo>, GitError> {
        let mut walk = self.repo.revwalk()?;
        walk.set_sorting(git2::Sort::TIME | git2::Sort::TOPOLOGICAL)?;
        for oid in &query.include {
            walk.push(to_git2_oid(oid)?)?;
        }
        for oid in &query.exclude {
            walk.hide(to_git2_oid(oid)?)?;
        }

        let mut out = Vec::new();
        let mut skipped = 0;
        for id in walk {
            if out.len() >= query.limit {
                break;
            }
            let commit = self.repo.find_commit(id?)?;
            if let Some(path) = &query.path {
                if !self.touches(&commit, path)? {
                    continue;
                }
            }
            if skipped < query.skip {
                skipped += 1;
                continue;
            }
            out.push(commit_info_of(&commit)?);
        }
        Ok(out)
    }

    /// Whether `commit` changed `path` relative to its first parent.
    fn touches(&self, commit: &git2::Commit<'_>, path: &str) -> Result<bool, GitError> {
        let path = Path::new(path.trim_end_matches('/'));
        let mine = entry_id(&commit.tree()?, path);
        let theirs = match commit.parent(0) {
            Ok(parent) => entry_id(&parent.tree()?, path),
            Err(_) => None,
        };
        Ok(mine != theirs)
    }

    /// Line ownership of `path` as of `at` (HEAD when `None`).
    pub fn blame(&self, path: &str, at: Option<&Oid>) -> Result<Vec<BlameHunk>, GitError> {
        let mut opts = git2::BlameOptions::new();
        if let Some(at) = at {
            opts.newest_commit(to_git2_oid(at)?);
        }
        let blame = self
            .repo
            .blame_file(Path::new(path), Some(&mut opts))
            .map_err(|e| match e.code() {
                git2::ErrorCode::NotFound => GitError::PathNotFound {
                    path: path.to_string(),
                },
                _ => e.into(),
            })?;

        let mut hunks = Vec::with_capacity(blame.len());
        for hunk in blame.iter() {
            let sig = hunk.final_signature();
            let start = hunk.final_start_line();
            hunks.push(BlameHunk {
                commit: from_git2_oid(hunk.final_commit_id())?,
                author: person_of(&sig),
                time: UtcTimestamp::from_epoch_seconds(sig.when().seconds()),
                start_line: start,
                end_line: start + hunk.lines_in_hunk().saturating_sub(1),
            });
        }
        Ok(hunks)
    }

    /// Content of `path` in commit `at`.
    pub fn blob_at(&self, at: &Oid, path: &str) -> Result<Vec<u8>, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2_oid(at)?)
            .map_err(|e| GitError::from_git2(e, at.as_str()))?;
        let not_found = || GitError::PathNotFound {
            path: path.to_string(),
        };
        let entry = commit
            .tree()?
            .get_path(Path::new(path))
            .map_err(|_| not_found())?;
        let blob = self
            .repo
            .find_blob(entry.id())
            .map_err(|_| not_found())?;
        Ok(blob.content().to_vec())
    }

    /// Branches and tags keyed by the commit id they point at.
    pub fn ref_labels(&self) -> Result<HashMap<String, RefLabels>, GitError> {
        let mut labels: HashMap<String, RefLabels> = HashMap::new();
        for reference in self.repo.references()? {
            let reference = reference?;
            let Some(name) = reference.name() else {
                continue;
            };
            let Ok(commit) = reference.peel_to_commit() else {
                continue;
            };
            let entry = labels.entry(commit.id().to_string()).or_default();
            if let Some(short) = name.strip_prefix("refs/heads/") {
                entry.branches.push(short.to_string());
            } else if let Some(short) = name.strip_prefix("refs/remotes/") {
                if !short.ends_with("/HEAD") {
                    entry.branches.push(short.to_string());
                }
            } else if let Some(short) = name.strip_prefix("refs/tags/") {
                entry.tags.push(short.to_string());
            }
        }
        for entry in labels.values_mut() {
            entry.branches.sort();
            entry.tags.sort();
        }
        Ok(labels)
    }
}

fn entry_id(tree: &git2::Tree<'_>, path: &Path) -> Option<git2::Oid> {
    tree.get_path(path).ok().map(|e| e.id())
}
