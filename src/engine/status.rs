//! engine::status
//!
//! Status reporting: how the working tree and index relate to HEAD for a
//! repository, folder or (rejected) single file.
//!
//! Every path lands in exactly one of seven categories. When git reports
//! several flags for one path the first matching category wins:
//!
//! ```text
//! Conflicting > Added > Removed > Missing > Modified > Changed > Untracked
//! ```
//!
//! Computing status is read-only: the index is not refreshed on disk.

use serde::Serialize;

use super::error::GatewayError;
use super::Repo;
use crate::core::address::{AddressError, OperationKind, ResourceAddress};
use crate::git::{GitState, PathStatus};

/// Status category of a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Unmerged in the index
    Conflicting,
    /// New in the index
    Added,
    /// Deleted in the index
    Removed,
    /// Deleted in the working tree only
    Missing,
    /// Working tree differs from the index
    Modified,
    /// Index differs from HEAD
    Changed,
    /// Not tracked
    Untracked,
}

/// Classify one path's flags. `None` for a clean path.
pub fn classify(status: &PathStatus) -> Option<Category> {
    if status.conflicted {
        Some(Category::Conflicting)
    } else if status.index_new {
        Some(Category::Added)
    } else if status.index_deleted {
        Some(Category::Removed)
    } else if status.wt_deleted {
        Some(Category::Missing)
    } else if status.wt_modified {
        Some(Category::Modified)
    } else if status.index_modified {
        Some(Category::Changed)
    } else if status.wt_new {
        Some(Category::Untracked)
    } else {
        None
    }
}

/// The seven disjoint path sets. Paths are repository-relative and sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub missing: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
    pub untracked: Vec<String>,
    pub conflicting: Vec<String>,
    pub state: GitState,
}

impl StatusSnapshot {
    /// An empty snapshot for a repository in `state`.
    pub fn empty(state: GitState) -> Self {
        Self {
            added: Vec::new(),
            changed: Vec::new(),
            missing: Vec::new(),
            modified: Vec::new(),
            removed: Vec::new(),
            untracked: Vec::new(),
            conflicting: Vec::new(),
            state,
        }
    }

    /// True when no path is reported.
    pub fn is_clean(&self) -> bool {
        self.added.is_empty()
            && self.changed.is_empty()
            && self.missing.is_empty()
            && self.modified.is_empty()
            && self.removed.is_empty()
            && self.untracked.is_empty()
            && self.conflicting.is_empty()
    }

    fn bucket(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::Added => &mut self.added,
            Category::Changed => &mut self.changed,
            Category::Missing => &mut self.missing,
            Category::Modified => &mut self.modified,
            Category::Removed => &mut self.removed,
            Category::Untracked => &mut self.untracked,
            Category::Conflicting => &mut self.conflicting,
        }
    }
}

/// Compute the status of the scope `address` names.
///
/// # Errors
///
/// - [`AddressError::IneligibleScope`] when the address names a plain file
/// - [`GatewayError::NotFound`] when the folder neither exists nor holds
///   tracked content
pub fn compute_status(repo: &Repo, address: &ResourceAddress) -> Result<StatusSnapshot, GatewayError> {
    let git = repo.git();
    let scope = address.relative_path();

    if let Some(path) = scope {
        if git.is_plain_file(path)? {
            return Err(AddressError::IneligibleScope {
                kind: OperationKind::Status.to_string(),
                target: path.to_string(),
            }
            .into());
        }
        if !git.work_dir()?.join(path).exists() && !git.is_tracked(path)? {
            return Err(GatewayError::NotFound(format!("no folder '{path}' in {}", repo.name())));
        }
    }

    let mut snapshot = StatusSnapshot::empty(git.state());
    for status in git.path_statuses()? {
        if !in_scope(scope, &status.path) {
            continue;
        }
        if let Some(category) = classify(&status) {
            snapshot.bucket(category).push(status.path);
        }
    }
    tracing::debug!(
        repository = repo.name(),
        scope = scope.unwrap_or("/"),
        clean = snapshot.is_clean(),
        "computed status"
    );
    Ok(snapshot)
}

fn in_scope(scope: Option<&str>, path: &str) -> bool {
    match scope {
        None => true,
        Some(folder) => path
            .strip_prefix(folder)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
    }
}

/// Express repository-relative `path` relative to the `scope` folder.
///
/// Paths outside the scope climb out with `..` segments.
pub fn relative_to(scope: Option<&str>, path: &str) -> String {
    let Some(scope) = scope.map(|s| s.trim_matches('/')).filter(|s| !s.is_empty()) else {
        return path.to_string();
    };
    let scope_parts: Vec<&str> = scope.split('/').collect();
    let parts: Vec<&str> = path.split('/').collect();
    let common = scope_parts
        .iter()
        .zip(&parts)
        .take_while(|(a, b)| a == b)
        .count();
    let mut out: Vec<&str> = vec![".."; scope_parts.len() - common];
    out.extend(&parts[common..]);
    out.join("/")
}

// =============================================================================
// Wire form
// =============================================================================

/// Links from a status entry to related resources.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntryLinks {
    pub diff_location: String,
    pub commit_location: String,
    pub index_location: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusEntry {
    /// Repository-relative path
    pub name: String,
    /// Path relative to the requested scope
    pub path: String,
    pub git: EntryLinks,
}

/// JSON body of a status response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusView {
    #[serde(rename = "Type")]
    pub kind: &'static str,
    pub location: String,
    pub added: Vec<StatusEntry>,
    pub changed: Vec<StatusEntry>,
    pub missing: Vec<StatusEntry>,
    pub modified: Vec<StatusEntry>,
    pub removed: Vec<StatusEntry>,
    pub untracked: Vec<StatusEntry>,
    pub conflicting: Vec<StatusEntry>,
    pub repository_state: &'static str,
    pub index_location: String,
    pub commit_location: String,
}

/// Render a snapshot for the scope it was computed for.
pub fn render_status(repo: &Repo, address: &ResourceAddress, snapshot: &StatusSnapshot) -> Result<StatusView, GatewayError> {
    let scope = address.relative_path();
    let entries = |paths: &[String], diff_scope: &str| -> Result<Vec<StatusEntry>, GatewayError> {
        paths
            .iter()
            .map(|name| {
                Ok(StatusEntry {
                    name: name.clone(),
                    path: relative_to(scope, name),
                    git: EntryLinks {
                        diff_location: repo.location(OperationKind::Diff, &[diff_scope], Some(name))?,
                        commit_location: repo.location(OperationKind::Commit, &["HEAD"], Some(name))?,
                        index_location: repo.location(OperationKind::Index, &[], Some(name))?,
                    },
                })
            })
            .collect()
    };

    let folder = scope.map(|s| format!("{s}/"));
    Ok(StatusView {
        kind: "Status",
        location: address.build(),
        added: entries(&snapshot.added, "Default")?,
        changed: entries(&snapshot.changed, "Cached")?,
        missing: entries(&snapshot.missing, "Default")?,
        modified: entries(&snapshot.modified, "Default")?,
        removed: entries(&snapshot.removed, "Cached")?,
        untracked: entries(&snapshot.untracked, "Default")?,
        conflicting: entries(&snapshot.conflicting, "Default")?,
        repository_state: snapshot.state.wire_name(),
        index_location: repo.location(OperationKind::Index, &[], folder.as_deref())?,
        commit_location: repo.location(OperationKind::Commit, &["HEAD"], folder.as_deref())?,
    })
}
