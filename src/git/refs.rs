//! git::refs
//!
//! Branch, tag and repository-local configuration CRUD.

use super::interface::{from_git2_oid, to_git2_oid, Git, GitError, Person};
use crate::core::types::{BranchName, Oid, RefName};

/// A local or remote-tracking branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchEntry {
    /// Short name (`main`, `origin/main`)
    pub name: String,
    /// Full ref name
    pub full_name: String,
    pub target: Oid,
    /// HEAD points at this branch
    pub current: bool,
    pub remote: bool,
}

/// A tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub name: String,
    pub full_name: String,
    /// Commit the tag resolves to
    pub target: Oid,
    /// Tag message, for annotated tags
    pub message: Option<String>,
}

/// One repository-local config entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

impl Git {
    // =========================================================================
    // Branches
    // =========================================================================

    /// Local (or remote-tracking) branches, sorted by name.
    pub fn list_branches(&self, remote: bool) -> Result<Vec<BranchEntry>, GitError> {
        let filter = if remote {
            git2::BranchType::Remote
        } else {
            git2::BranchType::Local
        };
        let mut out = Vec::new();
        for branch in self.repo.branches(Some(filter))? {
            let (branch, _) = branch?;
            let reference = branch.get();
            let (Some(full_name), Some(name)) = (reference.name(), reference.shorthand()) else {
                continue;
            };
            if remote && full_name.ends_with("/HEAD") {
                continue;
            }
            let Ok(commit) = reference.peel_to_commit() else {
                continue;
            };
            out.push(BranchEntry {
                name: name.to_string(),
                full_name: full_name.to_string(),
                target: from_git2_oid(commit.id())?,
                current: branch.is_head(),
                remote,
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Create a local branch at `start` (HEAD when `None`).
    pub fn create_branch(&self, name: &BranchName, start: Option<&str>) -> Result<BranchEntry, GitError> {
        let target = match start {
            Some(spec) => self.resolve_commit(spec)?,
            None => self.head_oid()?.ok_or_else(|| GitError::RefNotFound {
                refname: "HEAD".into(),
            })?,
        };
        let commit = self.repo.find_commit(to_git2_oid(&target)?)?;
        let refname = RefName::for_branch(name);
        self.repo
            .branch(name.as_str(), &commit, false)
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        tracing::debug!(branch = %name, at = %target, "created branch");

        Ok(BranchEntry {
            name: name.to_string(),
            full_name: refname.to_string(),
            target,
            current: false,
            remote: false,
        })
    }

    /// Delete a local branch. The checked-out branch cannot be deleted.
    pub fn delete_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let refname = RefName::for_branch(name);
        let mut branch = self
            .repo
            .find_branch(name.as_str(), git2::BranchType::Local)
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        if branch.is_head() {
            return Err(GitError::AccessError {
                message: format!("cannot delete checked-out branch {name}"),
            });
        }
        branch.delete()?;
        tracing::debug!(branch = %name, "deleted branch");
        Ok(())
    }

    // =========================================================================
    // Tags
    // =========================================================================

    /// All tags, sorted by name.
    pub fn list_tags(&self) -> Result<Vec<TagEntry>, GitError> {
        let mut out = Vec::new();
        for name in self.repo.tag_names(None)?.iter().flatten() {
            out.push(self.find_tag(name)?);
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Look up one tag.
    pub fn find_tag(&self, name: &str) -> Result<TagEntry, GitError> {
        let refname = RefName::for_tag(name)?;
        let reference = self
            .repo
            .find_reference(refname.as_str())
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        let commit = reference.peel_to_commit()?;
        let message = reference
            .peel_to_tag()
            .ok()
            .and_then(|t| t.message().map(str::to_string));
        Ok(TagEntry {
            name: name.to_string(),
            full_name: refname.to_string(),
            target: from_git2_oid(commit.id())?,
            message,
        })
    }

    /// Tag `target` (HEAD when `None`). A message makes an annotated tag.
    pub fn create_tag(
        &self,
        name: &str,
        target: Option<&str>,
        message: Option<&str>,
        who: Option<&Person>,
    ) -> Result<TagEntry, GitError> {
        let refname = RefName::for_tag(name)?;
        let oid = self.resolve_commit(target.unwrap_or("HEAD"))?;
        let object = self.repo.find_object(to_git2_oid(&oid)?, None)?;
        let result = match message {
            Some(message) => {
                let sig = self.signature(who)?;
                self.repo.tag(name, &object, &sig, message, false)
            }
            None => self.repo.tag_lightweight(name, &object, false),
        };
        result.map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        tracing::debug!(tag = name, at = %oid, "created tag");
        self.find_tag(name)
    }

    pub fn delete_tag(&self, name: &str) -> Result<(), GitError> {
        let refname = RefName::for_tag(name)?;
        if !self.ref_exists(refname.as_str()) {
            return Err(GitError::RefNotFound {
                refname: refname.to_string(),
            });
        }
        self.repo.tag_delete(name)?;
        Ok(())
    }

    // =========================================================================
    // Repository-local config
    // =========================================================================

    fn local_config(&self) -> Result<git2::Config, GitError> {
        Ok(self.repo.config()?.open_level(git2::ConfigLevel::Local)?)
    }

    /// Entries of `.git/config`, in file order.
    pub fn config_entries(&self) -> Result<Vec<ConfigEntry>, GitError> {
        let config = self.local_config()?;
        let mut entries = config.entries(None)?;
        let mut out = Vec::new();
        while let Some(entry) = entries.next() {
            let entry = entry?;
            if let (Some(key), Some(value)) = (entry.name(), entry.value()) {
                out.push(ConfigEntry {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(out)
    }

    pub fn config_get(&self, key: &str) -> Result<Option<String>, GitError> {
        match self.local_config()?.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn config_set(&self, key: &str, value: &str) -> Result<(), GitError> {
        let mut config = self.local_config()?;
        config.set_str(key, value).map_err(|e| GitError::InvalidArgument {
            message: format!("invalid config key '{key}': {}", e.message()),
        })?;
        Ok(())
    }

    /// Remove `key`. Returns false when it was not set.
    pub fn config_delete(&self, key: &str) -> Result<bool, GitError> {
        let mut config = self.local_config()?;
        match config.remove(key) {
            Ok(()) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
