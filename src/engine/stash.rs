//! engine::stash
//!
//! `stash/file/{repo}/` lists and saves, `stash/{rev}/file/{repo}/`
//! addresses one entry. `rev` is `stash@{n}` or the entry's commit id.
//!
//! | Method | whole stash | one entry |
//! |---|---|---|
//! | `GET` | list | describe |
//! | `POST` | save | - |
//! | `PUT` | pop the newest | apply |
//! | `DELETE` | clear | drop |

use serde::{Deserialize, Serialize};

use super::error::GatewayError;
use super::refs::Listing;
use super::Repo;
use crate::core::address::{OperationKind, ResourceAddress};
use crate::core::types::Oid;
use crate::git::{StashEntry, StashRequest};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StashView {
    pub id: Oid,
    pub index: usize,
    pub message: String,
    pub location: String,
    pub commit_location: String,
}

/// Body of `POST stash/file/{repo}/`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StashPost {
    pub index_message: Option<String>,
    pub working_directory_message: Option<String>,
    #[serde(default)]
    pub include_untracked: bool,
}

/// Body of `PUT stash/...`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StashPut {
    #[serde(default = "restore_index_default")]
    pub apply_index: bool,
}

impl Default for StashPut {
    fn default() -> Self {
        Self {
            apply_index: restore_index_default(),
        }
    }
}

fn restore_index_default() -> bool {
    true
}

fn stash_view(repo: &Repo, entry: StashEntry) -> Result<StashView, GatewayError> {
    Ok(StashView {
        location: repo.location(OperationKind::Stash, &[entry.id.as_str()], None)?,
        commit_location: repo.location(OperationKind::Commit, &[entry.id.as_str()], None)?,
        id: entry.id,
        index: entry.index,
        message: entry.message,
    })
}

/// Find the entry `rev` names.
fn find_entry(repo: &Repo, rev: &str) -> Result<StashEntry, GatewayError> {
    let entries = repo.git().stash_list()?;
    if entries.is_empty() {
        return Err(GatewayError::BadRequest("the stash is empty".into()));
    }
    let invalid = || GatewayError::BadRequest(format!("invalid stash revision '{rev}'"));
    let found = match stash_index(rev) {
        Some(index) => entries.into_iter().find(|e| e.index == index),
        None => {
            let oid = repo.git().try_resolve_commit(rev).map_err(|_| invalid())?;
            entries.into_iter().find(|e| Some(&e.id) == oid.as_ref())
        }
    };
    found.ok_or_else(invalid)
}

/// `stash@{n}` -> `n`.
fn stash_index(rev: &str) -> Option<usize> {
    rev.strip_prefix("stash@{")?.strip_suffix('}')?.parse().ok()
}

pub fn list(repo: &Repo, address: &ResourceAddress) -> Result<Listing<StashView>, GatewayError> {
    let children = repo
        .git()
        .stash_list()?
        .into_iter()
        .map(|e| stash_view(repo, e))
        .collect::<Result<_, _>>()?;
    Ok(Listing {
        kind: "StashCommit",
        location: address.build(),
        children,
    })
}

pub fn get(repo: &Repo, address: &ResourceAddress) -> Result<StashView, GatewayError> {
    let rev = address.ref_or_commit().unwrap_or_default();
    stash_view(repo, find_entry(repo, rev)?)
}

/// Stash local changes. Nothing to stash is a client error.
pub fn save(repo: &Repo, body: &StashPost) -> Result<StashView, GatewayError> {
    let message = body
        .working_directory_message
        .clone()
        .or_else(|| body.index_message.clone())
        .filter(|m| !m.trim().is_empty());
    let request = StashRequest {
        message,
        include_untracked: body.include_untracked,
    };

    let _lock = repo.lock()?;
    let git = repo.git();
    let id = git
        .stash_save(&request, repo.identity().as_ref())?
        .ok_or_else(|| GatewayError::BadRequest("there are no local changes to stash".into()))?;
    tracing::info!(repository = repo.name(), stash = %id, "stashed");
    let entry = git
        .stash_list()?
        .into_iter()
        .find(|e| e.id == id)
        .ok_or_else(|| GatewayError::Engine(format!("stash {id} vanished")))?;
    stash_view(repo, entry)
}

/// Apply the addressed entry, or pop the newest one for the whole stash.
pub fn apply(repo: &Repo, address: &ResourceAddress, body: &StashPut) -> Result<(), GatewayError> {
    let _lock = repo.lock()?;
    let (entry, pop) = match address.ref_or_commit() {
        Some(rev) => (find_entry(repo, rev)?, false),
        None => (find_entry(repo, "stash@{0}")?, true),
    };
    repo.git().stash_apply(entry.index, body.apply_index, pop)?;
    tracing::info!(repository = repo.name(), stash = %entry.id, pop, "applied stash");
    Ok(())
}

/// Drop the addressed entry, or every entry for the whole stash.
pub fn drop_entries(repo: &Repo, address: &ResourceAddress) -> Result<(), GatewayError> {
    let _lock = repo.lock()?;
    let git = repo.git();
    match address.ref_or_commit() {
        Some(rev) => {
            let entry = find_entry(repo, rev)?;
            git.stash_drop(entry.index)?;
            tracing::info!(repository = repo.name(), stash = %entry.id, "dropped stash entry");
        }
        None => {
            let count = git.stash_list()?.len();
            if count == 0 {
                return Err(GatewayError::BadRequest("the stash is empty".into()));
            }
            for _ in 0..count {
                git.stash_drop(0)?;
            }
            tracing::info!(repository = repo.name(), entries = count, "cleared stash");
        }
    }
    Ok(())
}
