//! engine::diff
//!
//! Diff resources. The single scope segment of a diff address picks the
//! two sides:
//!
//! | Scope | Old | New |
//! |---|---|---|
//! | `Default` | index | working tree |
//! | `Cached` | HEAD | index |
//! | `A..B` | commit `A` | commit `B` |
//! | any other ref | that ref | working tree |
//!
//! Which facets of the result are serialized (JSON, patch text or both) is
//! the server's concern; the same [`DiffReport`] backs all of them.

use serde::Serialize;

use super::error::GatewayError;
use super::Repo;
use crate::core::address::{OperationKind, ResourceAddress};
use crate::core::types::Oid;
use crate::git::{ChangeKind, DiffSide, FileChange, DEV_NULL};

/// The two sides a diff scope names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffScope {
    /// Index to working tree
    Default,
    /// HEAD to index
    Cached,
    /// Commit to commit
    Range { old: String, new: String },
    /// Ref to working tree
    Ref(String),
}

impl DiffScope {
    pub fn parse(segment: &str) -> Result<Self, GatewayError> {
        match segment {
            "Default" => Ok(DiffScope::Default),
            "Cached" => Ok(DiffScope::Cached),
            s => match s.split_once("..") {
                Some((old, new)) if !old.is_empty() && !new.is_empty() => Ok(DiffScope::Range {
                    old: old.to_string(),
                    new: new.to_string(),
                }),
                Some(_) => Err(GatewayError::BadRequest(format!("incomplete diff range '{s}'"))),
                None => Ok(DiffScope::Ref(s.to_string())),
            },
        }
    }
}

/// Wire name of a change kind.
pub fn change_type(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Add => "ADD",
        ChangeKind::Modify => "MODIFY",
        ChangeKind::Delete => "DELETE",
        ChangeKind::Rename => "RENAME",
        ChangeKind::Copy => "COPY",
    }
}

/// One changed file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiffEntry {
    pub old_path: String,
    pub new_path: String,
    pub change_type: &'static str,
    /// Content of the old side, when it is addressable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_location: Option<String>,
}

/// JSON facet of a diff.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiffView {
    #[serde(rename = "Type")]
    pub kind: &'static str,
    pub location: String,
    pub old: String,
    pub new: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    pub children: Vec<DiffEntry>,
}

/// Both facets of a computed diff.
#[derive(Debug, Clone)]
pub struct DiffReport {
    pub view: DiffView,
    /// Unified patch text
    pub patch: String,
}

/// Compute the diff `address` names.
///
/// `filters` are repository-relative paths; when empty, the address's own
/// path (if any) is the filter.
pub fn compute_diff(repo: &Repo, address: &ResourceAddress, filters: &[String]) -> Result<DiffReport, GatewayError> {
    let segment = address
        .ref_or_commit()
        .ok_or_else(|| GatewayError::BadRequest("diff address has no scope".into()))?;
    let scope = DiffScope::parse(segment)?;
    let git = repo.git();

    let (old, new, base) = match &scope {
        DiffScope::Default => (DiffSide::Index, DiffSide::WorkTree, Some("Index".to_string())),
        DiffScope::Cached => {
            let head = git.head_oid()?;
            let base = head.as_ref().map(|h| h.to_string());
            let old = head.map_or(DiffSide::Empty, DiffSide::Commit);
            (old, DiffSide::Index, base)
        }
        DiffScope::Range { old, new } => {
            let old = git.resolve_commit(old)?;
            let new = git.resolve_commit(new)?;
            let base = git.merge_base(&old, &new)?.map(|b| b.to_string());
            (DiffSide::Commit(old), DiffSide::Commit(new), base)
        }
        DiffScope::Ref(name) => (
            DiffSide::Commit(git.resolve_commit(name)?),
            DiffSide::WorkTree,
            Some("Index".to_string()),
        ),
    };

    let filters: Vec<String> = if filters.is_empty() {
        address.relative_path().map(str::to_string).into_iter().collect()
    } else {
        filters.to_vec()
    };
    let output = git.diff(&old, &new, &filters)?;
    tracing::debug!(
        repository = repo.name(),
        scope = segment,
        files = output.files.len(),
        "computed diff"
    );

    let children = output
        .files
        .iter()
        .map(|change| entry(repo, change, &old, &new))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DiffReport {
        view: DiffView {
            kind: "Diff",
            location: address.build(),
            old: side_label(&old),
            new: side_label(&new),
            base,
            children,
        },
        patch: output.patch,
    })
}

/// Location of the diff between the address's scope and `new`.
///
/// Backs `POST diff/{old}/...` with `{"New": ...}`.
pub fn compare_location(address: &ResourceAddress, new: &str) -> Result<String, GatewayError> {
    let old = address
        .ref_or_commit()
        .ok_or_else(|| GatewayError::BadRequest("diff address has no scope".into()))?;
    if new.is_empty() {
        return Err(GatewayError::BadRequest("New must name a commit or ref".into()));
    }
    let rescoped = address.rescoped(OperationKind::Diff, vec![format!("{old}..{new}")])?;
    Ok(rescoped.build())
}

fn side_label(side: &DiffSide) -> String {
    match side {
        DiffSide::Commit(oid) => oid.to_string(),
        DiffSide::Empty => "EmptyTree".to_string(),
        DiffSide::Index => "Index".to_string(),
        DiffSide::WorkTree => "WorkingTree".to_string(),
    }
}

fn entry(repo: &Repo, change: &FileChange, old: &DiffSide, new: &DiffSide) -> Result<DiffEntry, GatewayError> {
    Ok(DiffEntry {
        old_path: change.old_path.clone(),
        new_path: change.new_path.clone(),
        change_type: change_type(change.kind),
        old_location: content_location(repo, old, &change.old_path)?,
        new_location: content_location(repo, new, &change.new_path)?,
    })
}

/// Where the content of `path` on `side` can be read, if anywhere.
pub(crate) fn content_location(repo: &Repo, side: &DiffSide, path: &str) -> Result<Option<String>, GatewayError> {
    if path == DEV_NULL {
        return Ok(None);
    }
    match side {
        DiffSide::Commit(oid) => Ok(Some(commit_content_location(repo, oid, path)?)),
        DiffSide::Index => Ok(Some(repo.location(OperationKind::Index, &[], Some(path))?)),
        DiffSide::Empty | DiffSide::WorkTree => Ok(None),
    }
}

pub(crate) fn commit_content_location(repo: &Repo, oid: &Oid, path: &str) -> Result<String, GatewayError> {
    let base = repo.location(OperationKind::Commit, &[oid.as_str()], Some(path))?;
    Ok(format!("{base}?parts=body"))
}
