//! engine::history
//!
//! Commit resources: paged log, new commits, historic file content and
//! blame.
//!
//! A log scoped to a file lists only the commits that changed it, and
//! each entry's diff is taken against the next older *listed* commit, not
//! against the commit's parent. The oldest entry a walk reaches (the end
//! of an `A..B` range, or of history) is diffed against its first parent.

use std::collections::HashMap;

use serde::Serialize;

use super::diff::{change_type, content_location, DiffEntry};
use super::error::GatewayError;
use super::Repo;
use crate::core::address::{OperationKind, ResourceAddress};
use crate::core::types::Oid;
use crate::git::{CommitInfo, CommitRequest, DiffSide, LogQuery, RefLabels};

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// One-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: usize,
    pub page_size: usize,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Paging {
    /// Read `page` and `pageSize` from decoded query pairs.
    pub fn from_query(query: &[(String, String)]) -> Result<Self, GatewayError> {
        let mut paging = Self::default();
        for (key, value) in query {
            let slot = match key.as_str() {
                "page" => &mut paging.page,
                "pageSize" => &mut paging.page_size,
                _ => continue,
            };
            *slot = value
                .parse()
                .ok()
                .filter(|n: &usize| *n > 0)
                .ok_or_else(|| GatewayError::BadRequest(format!("{key} must be a positive integer, got '{value}'")))?;
        }
        Ok(paging)
    }

    fn skip(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// A commit as served.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommitNode {
    #[serde(rename = "Type")]
    pub kind: &'static str,
    pub id: Oid,
    pub parents: Vec<Oid>,
    pub author_name: String,
    pub author_email: String,
    pub committer_name: String,
    pub committer_email: String,
    pub message: String,
    /// Committer time, milliseconds since the epoch
    pub time: i64,
    pub branches: Vec<String>,
    pub tags: Vec<String>,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diffs: Option<Vec<DiffEntry>>,
}

/// One page of history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogView {
    #[serde(rename = "Type")]
    pub kind: &'static str,
    pub location: String,
    pub children: Vec<CommitNode>,
    pub has_next: bool,
    pub has_prev: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_location: Option<String>,
    pub repository_path: String,
}

/// One page of the history `address` names.
///
/// The scope is a ref, a commit, or `A..B` for the commits reachable from
/// `B` but not from `A`. A page past the end is empty.
pub fn log(repo: &Repo, address: &ResourceAddress, paging: Paging) -> Result<LogView, GatewayError> {
    let git = repo.git();
    let scope = address
        .ref_or_commit()
        .ok_or_else(|| GatewayError::BadRequest("log address has no ref".into()))?;
    let (include, exclude) = match scope.split_once("..") {
        Some((from, to)) if !from.is_empty() && !to.is_empty() => {
            (git.resolve_commit(to)?, Some(git.resolve_commit(from)?))
        }
        Some(_) => return Err(GatewayError::BadRequest(format!("incomplete range '{scope}'"))),
        None => (git.resolve_commit(scope)?, None),
    };

    let path = address.relative_path();
    let commits = git.log(&LogQuery {
        include: vec![include],
        exclude: exclude.into_iter().collect(),
        path: path.map(str::to_string),
        skip: paging.skip(),
        limit: paging.page_size + 1,
    })?;
    let has_next = commits.len() > paging.page_size;
    let has_prev = paging.page > 1;

    let labels = git.ref_labels()?;
    let file = path.filter(|_| !address.is_folder());
    let children = commits
        .iter()
        .take(paging.page_size)
        .enumerate()
        .map(|(i, commit)| {
            // The walk may end before the file's real predecessor: the
            // last entry of a range or of the whole history.
            let predecessor = commits
                .get(i + 1)
                .map(|p| &p.oid)
                .or_else(|| commit.parents.first());
            commit_node(repo, commit, &labels, file, predecessor)
        })
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(
        repository = repo.name(),
        scope,
        page = paging.page,
        entries = children.len(),
        has_next,
        "served log page"
    );

    let page_location = |page: usize| format!("{}?page={page}&pageSize={}", address.build(), paging.page_size);
    Ok(LogView {
        kind: "Log",
        location: address.build(),
        children,
        has_next,
        has_prev,
        next_location: has_next.then(|| page_location(paging.page + 1)),
        previous_location: has_prev.then(|| page_location(paging.page - 1)),
        repository_path: path.unwrap_or_default().to_string(),
    })
}

/// Build the served form of a commit.
///
/// With `file`, the node links to that file's content at the commit and
/// carries its diff against `predecessor` (the empty tree when `None`).
fn commit_node(
    repo: &Repo,
    info: &CommitInfo,
    labels: &HashMap<String, RefLabels>,
    file: Option<&str>,
    predecessor: Option<&Oid>,
) -> Result<CommitNode, GatewayError> {
    let label = labels.get(info.oid.as_str()).cloned().unwrap_or_default();
    let commit_side = DiffSide::Commit(info.oid.clone());

    let (content, diffs) = match file {
        Some(file) => {
            let old = predecessor.map_or(DiffSide::Empty, |p| DiffSide::Commit(p.clone()));
            let output = repo.git().diff(&old, &commit_side, &[file.to_string()])?;
            let diffs = output
                .files
                .iter()
                .map(|change| {
                    Ok(DiffEntry {
                        old_path: change.old_path.clone(),
                        new_path: change.new_path.clone(),
                        change_type: change_type(change.kind),
                        old_location: content_location(repo, &old, &change.old_path)?,
                        new_location: content_location(repo, &commit_side, &change.new_path)?,
                    })
                })
                .collect::<Result<Vec<_>, GatewayError>>()?;
            (content_location(repo, &commit_side, file)?, Some(diffs))
        }
        None => (None, None),
    };

    Ok(CommitNode {
        kind: "Commit",
        id: info.oid.clone(),
        parents: info.parents.clone(),
        author_name: info.author.name.clone(),
        author_email: info.author.email.clone(),
        committer_name: info.committer.name.clone(),
        committer_email: info.committer.email.clone(),
        message: info.message.clone(),
        time: info.time.epoch_millis(),
        branches: label.branches,
        tags: label.tags,
        location: repo.location(OperationKind::Commit, &[info.oid.as_str()], None)?,
        content_location: content,
        diffs,
    })
}

/// Commit the index and return the new commit.
pub fn create_commit(repo: &Repo, request: &CommitRequest) -> Result<CommitNode, GatewayError> {
    let git = repo.git();
    let id = {
        let _lock = repo.lock()?;
        git.commit(request)?
    };
    tracing::info!(repository = repo.name(), commit = %id, amend = request.amend, "committed");
    let info = git.commit_info(&id)?;
    commit_node(repo, &info, &git.ref_labels()?, None, None)
}

/// Raw content of the file `address` names, at the address's ref.
pub fn commit_content(repo: &Repo, address: &ResourceAddress) -> Result<Vec<u8>, GatewayError> {
    let git = repo.git();
    let reference = address
        .ref_or_commit()
        .ok_or_else(|| GatewayError::BadRequest("content address has no ref".into()))?;
    let path = file_path(address)?;
    let oid = git.resolve_commit(reference)?;
    Ok(git.blob_at(&oid, path)?)
}

fn file_path(address: &ResourceAddress) -> Result<&str, GatewayError> {
    address
        .relative_path()
        .filter(|_| !address.is_folder())
        .ok_or_else(|| GatewayError::BadRequest(format!("{} needs a file path", address.kind())))
}

// =============================================================================
// Blame
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlameEntry {
    pub commit_id: Oid,
    pub author_name: String,
    pub author_email: String,
    /// Milliseconds since the epoch
    pub time: i64,
    pub start_line: usize,
    pub end_line: usize,
    pub commit_location: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlameView {
    #[serde(rename = "Type")]
    pub kind: &'static str,
    pub location: String,
    pub children: Vec<BlameEntry>,
}

/// Line ownership of the file `address` names, at its optional commit.
pub fn blame(repo: &Repo, address: &ResourceAddress) -> Result<BlameView, GatewayError> {
    let git = repo.git();
    let path = file_path(address)?;
    let at = address
        .ref_or_commit()
        .map(|r| git.resolve_commit(r))
        .transpose()?;

    let children = git
        .blame(path, at.as_ref())?
        .into_iter()
        .map(|hunk| {
            Ok(BlameEntry {
                commit_location: repo.location(OperationKind::Commit, &[hunk.commit.as_str()], None)?,
                commit_id: hunk.commit,
                author_name: hunk.author.name,
                author_email: hunk.author.email,
                time: hunk.time.epoch_millis(),
                start_line: hunk.start_line,
                end_line: hunk.end_line,
            })
        })
        .collect::<Result<Vec<_>, GatewayError>>()?;

    Ok(BlameView {
        kind: "Blame",
        location: address.build(),
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn paging_defaults() {
        let paging = Paging::from_query(&[]).unwrap();
        assert_eq!(paging, Paging::default());
        assert_eq!(paging.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn paging_reads_both_keys() {
        let paging = Paging::from_query(&query(&[("page", "3"), ("pageSize", "5"), ("parts", "body")])).unwrap();
        assert_eq!(paging, Paging { page: 3, page_size: 5 });
        assert_eq!(paging.skip(), 10);
    }

    #[test]
    fn zero_and_garbage_are_rejected() {
        assert!(Paging::from_query(&query(&[("page", "0")])).is_err());
        assert!(Paging::from_query(&query(&[("pageSize", "0")])).is_err());
        assert!(Paging::from_query(&query(&[("page", "two")])).is_err());
    }
}
