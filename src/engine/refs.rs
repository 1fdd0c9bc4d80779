//! engine::refs
//!
//! Branch, tag and repository-config resources.

use serde::{Deserialize, Serialize};

use super::error::GatewayError;
use super::Repo;
use crate::core::address::{OperationKind, ResourceAddress};
use crate::core::types::{BranchName, Oid};
use crate::git::{BranchEntry, ConfigEntry, TagEntry};

/// A list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Listing<T> {
    #[serde(rename = "Type")]
    pub kind: &'static str,
    pub location: String,
    pub children: Vec<T>,
}

fn scope_name(address: &ResourceAddress, what: &str) -> Result<String, GatewayError> {
    address
        .ref_or_commit()
        .map(str::to_string)
        .ok_or_else(|| GatewayError::BadRequest(format!("address names no {what}")))
}

// =============================================================================
// Branches
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BranchView {
    pub name: String,
    pub full_name: String,
    pub id: Oid,
    pub current: bool,
    pub remote: bool,
    pub location: String,
    pub commit_location: String,
}

/// Body of `POST branch/file/{repo}/`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BranchPost {
    pub name: String,
    pub start_point: Option<String>,
}

fn branch_view(repo: &Repo, entry: BranchEntry) -> Result<BranchView, GatewayError> {
    Ok(BranchView {
        location: repo.location(OperationKind::Branch, &[entry.name.as_str()], None)?,
        commit_location: repo.location(OperationKind::Commit, &[entry.name.as_str()], None)?,
        name: entry.name,
        full_name: entry.full_name,
        id: entry.target,
        current: entry.current,
        remote: entry.remote,
    })
}

/// Local branches.
pub fn list_branches(repo: &Repo, address: &ResourceAddress) -> Result<Listing<BranchView>, GatewayError> {
    let children = repo
        .git()
        .list_branches(false)?
        .into_iter()
        .map(|b| branch_view(repo, b))
        .collect::<Result<_, _>>()?;
    Ok(Listing {
        kind: "Branch",
        location: address.build(),
        children,
    })
}

/// The local branch `address` names.
pub fn get_branch(repo: &Repo, address: &ResourceAddress) -> Result<BranchView, GatewayError> {
    let name = scope_name(address, "branch")?;
    let entry = repo
        .git()
        .list_branches(false)?
        .into_iter()
        .find(|b| b.name == name)
        .ok_or_else(|| GatewayError::NotFound(format!("no branch '{name}'")))?;
    branch_view(repo, entry)
}

pub fn create_branch(repo: &Repo, body: &BranchPost) -> Result<BranchView, GatewayError> {
    let name = BranchName::new(body.name.as_str())?;
    let entry = repo.git().create_branch(&name, body.start_point.as_deref())?;
    tracing::info!(repository = repo.name(), branch = %name, "created branch");
    branch_view(repo, entry)
}

pub fn delete_branch(repo: &Repo, address: &ResourceAddress) -> Result<(), GatewayError> {
    let name = BranchName::new(scope_name(address, "branch")?)?;
    repo.git().delete_branch(&name)?;
    tracing::info!(repository = repo.name(), branch = %name, "deleted branch");
    Ok(())
}

// =============================================================================
// Tags
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagView {
    pub name: String,
    pub full_name: String,
    pub id: Oid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub location: String,
    pub commit_location: String,
}

/// Body of `POST tag/file/{repo}/`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagPost {
    pub name: String,
    pub commit: Option<String>,
    pub message: Option<String>,
}

fn tag_view(repo: &Repo, entry: TagEntry) -> Result<TagView, GatewayError> {
    Ok(TagView {
        location: repo.location(OperationKind::Tag, &[entry.name.as_str()], None)?,
        commit_location: repo.location(OperationKind::Commit, &[entry.target.as_str()], None)?,
        name: entry.name,
        full_name: entry.full_name,
        id: entry.target,
        message: entry.message,
    })
}

pub fn list_tags(repo: &Repo, address: &ResourceAddress) -> Result<Listing<TagView>, GatewayError> {
    let children = repo
        .git()
        .list_tags()?
        .into_iter()
        .map(|t| tag_view(repo, t))
        .collect::<Result<_, _>>()?;
    Ok(Listing {
        kind: "Tag",
        location: address.build(),
        children,
    })
}

pub fn get_tag(repo: &Repo, address: &ResourceAddress) -> Result<TagView, GatewayError> {
    let name = scope_name(address, "tag")?;
    tag_view(repo, repo.git().find_tag(&name)?)
}

pub fn create_tag(repo: &Repo, body: &TagPost) -> Result<TagView, GatewayError> {
    let message = body.message.as_deref().filter(|m| !m.is_empty());
    let entry = repo.git().create_tag(
        &body.name,
        body.commit.as_deref(),
        message,
        repo.identity().as_ref(),
    )?;
    tracing::info!(repository = repo.name(), tag = %body.name, annotated = message.is_some(), "created tag");
    tag_view(repo, entry)
}

pub fn delete_tag(repo: &Repo, address: &ResourceAddress) -> Result<(), GatewayError> {
    let name = scope_name(address, "tag")?;
    repo.git().delete_tag(&name)?;
    tracing::info!(repository = repo.name(), tag = %name, "deleted tag");
    Ok(())
}

// =============================================================================
// Config
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigView {
    pub key: String,
    pub value: String,
    pub location: String,
}

/// Body of `POST config/file/{repo}/`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigPost {
    pub key: String,
    pub value: String,
}

/// Body of `PUT config/{key}/file/{repo}/`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigPut {
    pub value: String,
}

fn config_view(repo: &Repo, entry: ConfigEntry) -> Result<ConfigView, GatewayError> {
    Ok(ConfigView {
        location: repo.location(OperationKind::Config, &[entry.key.as_str()], None)?,
        key: entry.key,
        value: entry.value,
    })
}

fn check_key(key: &str) -> Result<(), GatewayError> {
    // section.name at minimum; git validates the rest
    let valid = key.split('.').count() >= 2 && !key.starts_with('.') && !key.ends_with('.');
    if valid {
        Ok(())
    } else {
        Err(GatewayError::BadRequest(format!("invalid config key '{key}'")))
    }
}

/// Repository-local entries.
pub fn list_config(repo: &Repo, address: &ResourceAddress) -> Result<Listing<ConfigView>, GatewayError> {
    let children = repo
        .git()
        .config_entries()?
        .into_iter()
        .map(|e| config_view(repo, e))
        .collect::<Result<_, _>>()?;
    Ok(Listing {
        kind: "Config",
        location: address.build(),
        children,
    })
}

pub fn get_config(repo: &Repo, address: &ResourceAddress) -> Result<ConfigView, GatewayError> {
    let key = scope_name(address, "config key")?;
    check_key(&key)?;
    let value = repo
        .git()
        .config_get(&key)?
        .ok_or_else(|| GatewayError::NotFound(format!("config key '{key}' is not set")))?;
    config_view(repo, ConfigEntry { key, value })
}

/// Set `key`; backs both `POST` (create) and `PUT` (update).
pub fn set_config(repo: &Repo, key: &str, value: &str) -> Result<ConfigView, GatewayError> {
    check_key(key)?;
    repo.git().config_set(key, value)?;
    tracing::info!(repository = repo.name(), key, "set config");
    config_view(
        repo,
        ConfigEntry {
            key: key.to_string(),
            value: value.to_string(),
        },
    )
}

pub fn delete_config(repo: &Repo, address: &ResourceAddress) -> Result<(), GatewayError> {
    let key = scope_name(address, "config key")?;
    check_key(&key)?;
    if !repo.git().config_delete(&key)? {
        return Err(GatewayError::NotFound(format!("config key '{key}' is not set")));
    }
    tracing::info!(repository = repo.name(), key = %key, "deleted config");
    Ok(())
}
