//! engine::remote
//!
//! Network operations (clone, fetch, pull, push) and the remote and clone
//! resources.
//!
//! Network operations are long-running: request handlers validate the
//! request up front and return a [`Job`] for the task registry. The job
//! reopens the repository on the blocking pool and hands the task's
//! cancel flag to the transport, which checks it on every progress report.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::GatewayError;
use super::orchestrator::merge::{merge_locked, MergeOutcome, MergeStatus};
use super::refs::Listing;
use super::{CancelToken, Gateway, Job, Outcome, Repo, TaskKind};
use crate::core::address::{OperationKind, ResourceAddress};
use crate::core::types::{BranchName, Oid};
use crate::git::{
    Credentials, Git, GitError, PushSpec, RefUpdate, RemoteEntry, RemoteSpec, TransferOutcome, TransferStatus,
};

/// Per-request transport credentials.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialsBody {
    pub git_ssh_username: Option<String>,
    pub git_ssh_password: Option<String>,
    pub git_ssh_private_key: Option<String>,
    pub git_ssh_public_key: Option<String>,
    pub git_ssh_passphrase: Option<String>,
}

impl From<CredentialsBody> for Credentials {
    fn from(body: CredentialsBody) -> Self {
        let non_empty = |s: Option<String>| s.filter(|v| !v.is_empty());
        Credentials {
            username: non_empty(body.git_ssh_username),
            password: non_empty(body.git_ssh_password),
            private_key: non_empty(body.git_ssh_private_key),
            public_key: non_empty(body.git_ssh_public_key),
            passphrase: non_empty(body.git_ssh_passphrase),
        }
    }
}

/// Body of `POST clone/file/{repo}/`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClonePost {
    pub git_url: String,
    pub branch: Option<String>,
    #[serde(flatten)]
    pub credentials: CredentialsBody,
}

/// Body of `POST remote/file/{repo}/`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteAdd {
    pub remote: Option<String>,
    #[serde(rename = "RemoteURI")]
    pub remote_uri: Option<String>,
    pub fetch_ref_spec: Option<String>,
    #[serde(rename = "PushURI")]
    pub push_uri: Option<String>,
    pub push_ref_spec: Option<String>,
}

/// Body of `POST remote/{remote}[/{branch}]/file/{repo}/`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemotePost {
    #[serde(default)]
    pub fetch: bool,
    /// Fetch, then merge the tracking branch into HEAD
    #[serde(default)]
    pub pull: bool,
    #[serde(default)]
    pub force: bool,
    pub push_src_ref: Option<String>,
    #[serde(default)]
    pub push_tags: bool,
    #[serde(flatten)]
    pub credentials: CredentialsBody,
}

// =============================================================================
// Transfer results
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferResult {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "UP_TO_DATE")]
    UpToDate,
    #[serde(rename = "REJECTED_NONFASTFORWARD")]
    RejectedNonFastForward,
    #[serde(rename = "REJECTED_OTHER")]
    RejectedOther,
}

impl From<TransferStatus> for TransferResult {
    fn from(status: TransferStatus) -> Self {
        match status {
            TransferStatus::Ok => TransferResult::Ok,
            TransferStatus::UpToDate => TransferResult::UpToDate,
            TransferStatus::RejectedNonFastForward => TransferResult::RejectedNonFastForward,
            TransferStatus::RejectedOther => TransferResult::RejectedOther,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateView {
    #[serde(rename = "Ref")]
    pub refname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<String>,
}

/// Wire form of a fetch or push result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransferView {
    pub result: TransferResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub updates: Vec<UpdateView>,
}

impl From<TransferOutcome> for TransferView {
    fn from(outcome: TransferOutcome) -> Self {
        TransferView {
            result: outcome.status.into(),
            message: outcome.message,
            updates: outcome
                .updates
                .into_iter()
                .map(|RefUpdate { refname, old, new }| UpdateView { refname, old, new })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullResult {
    Ok,
    Failed,
}

/// Wire form of a pull result: the fetch, then the merge it fed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PullView {
    pub result: PullResult,
    pub fetch: TransferView,
    pub merge: MergeOutcome,
}

impl PullView {
    fn new(fetch: TransferView, merge: MergeOutcome) -> Self {
        let merged = matches!(
            merge.result,
            MergeStatus::AlreadyUpToDate | MergeStatus::FastForward | MergeStatus::Merged
        );
        Self {
            result: if merged { PullResult::Ok } else { PullResult::Failed },
            fetch,
            merge,
        }
    }
}

fn to_outcome<T: Serialize>(body: &T) -> Result<Outcome, GatewayError> {
    let value = serde_json::to_value(body).map_err(|e| GatewayError::Engine(format!("encoding result: {e}")))?;
    Ok(Outcome::ok(value))
}

// =============================================================================
// Jobs
// =============================================================================

/// A clone destination this request created.
///
/// The directory is removed on drop unless [`CloneTarget::keep`] was
/// called, so a failed, cancelled or never-run clone leaves nothing behind.
/// Only the request that created the directory ever removes it.
struct CloneTarget {
    path: PathBuf,
    keep: bool,
}

impl CloneTarget {
    /// Create `path` as a new, empty directory. An existing entry is a
    /// conflict: another clone or repository owns the name.
    fn create(path: PathBuf, name: &str) -> Result<Self, GatewayError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GatewayError::Engine(format!("creating {}: {e}", parent.display())))?;
        }
        match std::fs::create_dir(&path) {
            Ok(()) => Ok(Self { path, keep: false }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(GatewayError::Conflict {
                message: format!("repository '{name}' already exists"),
                detail: None,
                paths: Vec::new(),
            }),
            Err(e) => Err(GatewayError::Engine(format!("creating {}: {e}", path.display()))),
        }
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for CloneTarget {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            tracing::warn!(dest = %self.path.display(), error = %e, "could not remove failed clone");
        }
    }
}

/// Validate a clone request, claim its destination and build the job that
/// performs it.
pub fn clone_job(gateway: &Gateway, address: &ResourceAddress, body: ClonePost) -> Result<Job, GatewayError> {
    let url = body.git_url.trim().to_string();
    if url.is_empty() {
        return Err(GatewayError::BadRequest("GitUrl must be provided".into()));
    }
    let name = address.repository().to_string();
    let location = ResourceAddress::new(OperationKind::Clone, Vec::new(), name.clone())?.build();
    let branch = body.branch.filter(|b| !b.is_empty());
    let creds = Credentials::from(body.credentials);
    let target = CloneTarget::create(gateway.repository_dir(&name), &name)?;
    tracing::info!(repository = %name, url = %url, "clone requested");

    Ok(Box::new(move |token: &CancelToken| {
        Git::clone_into(&url, &target.path, branch.as_deref(), &creds, token.flag())?;
        target.keep();
        Ok(Outcome::created(
            json!({ "Type": "Clone", "Location": location, "Id": name }),
            location.clone(),
        ))
    }))
}

/// Validate a fetch, pull or push request and build its job.
pub fn remote_job(
    gateway: Arc<Gateway>,
    address: &ResourceAddress,
    body: RemotePost,
) -> Result<(TaskKind, Job), GatewayError> {
    // Fail fast on a missing repository or remote.
    let repo = gateway.open(address)?;
    let remote = address
        .scope()
        .first()
        .cloned()
        .ok_or_else(|| GatewayError::BadRequest("address names no remote".into()))?;
    repo.git().find_remote(&remote)?;
    let branch = address.scope().get(1).map(BranchName::new).transpose()?;
    let creds = Credentials::from(body.credentials);
    let name = address.repository().to_string();

    if body.pull {
        let force = body.force;
        let branch = match branch {
            Some(branch) => branch,
            None => repo.git().current_branch()?.ok_or_else(|| GatewayError::Conflict {
                message: "cannot pull into a detached HEAD".into(),
                detail: None,
                paths: Vec::new(),
            })?,
        };
        tracing::info!(repository = %name, remote = %remote, branch = %branch, "pull requested");
        let job: Job = Box::new(move |token: &CancelToken| {
            let repo = gateway.open_named(&name)?;
            let fetched = repo
                .git()
                .fetch(&remote, Some(&branch), force, &creds, token.flag())?;
            if token.is_cancelled() {
                return Err(GitError::Cancelled.into());
            }
            let _lock = repo.lock()?;
            let merged = merge_locked(&repo, &format!("{remote}/{branch}"), false)?;
            to_outcome(&PullView::new(fetched.into(), merged))
        });
        return Ok((TaskKind::Pull, job));
    }

    if body.fetch {
        let force = body.force;
        tracing::info!(repository = %name, remote = %remote, force, "fetch requested");
        let job: Job = Box::new(move |token: &CancelToken| {
            let repo = gateway.open_named(&name)?;
            let outcome = repo
                .git()
                .fetch(&remote, branch.as_ref(), force, &creds, token.flag())?;
            to_outcome(&TransferView::from(outcome))
        });
        return Ok((TaskKind::Fetch, job));
    }

    let src = body
        .push_src_ref
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GatewayError::BadRequest("give Fetch or PushSrcRef".into()))?;
    let branch = branch.ok_or_else(|| GatewayError::BadRequest("push address names no remote branch".into()))?;
    let (tags, force) = (body.push_tags, body.force);
    tracing::info!(repository = %name, remote = %remote, branch = %branch, force, "push requested");
    let job: Job = Box::new(move |token: &CancelToken| {
        let repo = gateway.open_named(&name)?;
        let spec = PushSpec {
            remote: &remote,
            src: &src,
            branch: &branch,
            tags,
            force,
        };
        let outcome = repo.git().push(&spec, &creds, token.flag())?;
        to_outcome(&TransferView::from(outcome))
    });
    Ok((TaskKind::Push, job))
}

// =============================================================================
// Remote and clone resources
// =============================================================================

/// Configure a new remote.
pub fn add_remote(repo: &Repo, body: &RemoteAdd) -> Result<RemoteView, GatewayError> {
    fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, GatewayError> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GatewayError::BadRequest(format!("{key} must be provided")))
    }
    fn optional(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
    let spec = RemoteSpec {
        name: required(&body.remote, "Remote")?,
        url: required(&body.remote_uri, "RemoteURI")?,
        fetch_refspec: optional(&body.fetch_ref_spec),
        push_url: optional(&body.push_uri),
        push_refspec: optional(&body.push_ref_spec),
    };
    let entry = repo.git().add_remote(&spec)?;
    tracing::info!(repository = repo.name(), remote = spec.name, url = spec.url, "added remote");
    remote_view(repo, entry)
}

/// Remove the remote `address` names.
pub fn remove_remote(repo: &Repo, address: &ResourceAddress) -> Result<(), GatewayError> {
    let remote = match address.scope() {
        [remote] => remote,
        _ => {
            return Err(GatewayError::BadRequest(
                "address must name exactly one remote".into(),
            ))
        }
    };
    repo.git().remove_remote(remote)?;
    tracing::info!(repository = repo.name(), remote = %remote, "removed remote");
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackingBranchView {
    pub name: String,
    pub full_name: String,
    pub id: Oid,
    pub location: String,
    pub commit_location: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteView {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_url: Option<String>,
    pub location: String,
    /// Tracking branches (only when a single remote is requested)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TrackingBranchView>>,
}

fn remote_view(repo: &Repo, entry: RemoteEntry) -> Result<RemoteView, GatewayError> {
    Ok(RemoteView {
        location: repo.location(OperationKind::Remote, &[entry.name.as_str()], None)?,
        name: entry.name,
        url: entry.url,
        push_url: entry.push_url,
        children: None,
    })
}

/// Configured remotes.
pub fn list_remotes(repo: &Repo, address: &ResourceAddress) -> Result<Listing<RemoteView>, GatewayError> {
    let children = repo
        .git()
        .list_remotes()?
        .into_iter()
        .map(|r| remote_view(repo, r))
        .collect::<Result<_, _>>()?;
    Ok(Listing {
        kind: "Remote",
        location: address.build(),
        children,
    })
}

/// One remote with its tracking branches, or a single tracking branch when
/// the address names one.
pub fn get_remote(repo: &Repo, address: &ResourceAddress) -> Result<RemoteView, GatewayError> {
    let git = repo.git();
    let remote = address
        .scope()
        .first()
        .ok_or_else(|| GatewayError::BadRequest("address names no remote".into()))?;
    let entry = git.find_remote(remote)?;
    let wanted = address.scope().get(1).map(|b| format!("{remote}/{b}"));
    let prefix = format!("{remote}/");

    let mut branches = Vec::new();
    for branch in git.list_branches(true)? {
        let selected = match &wanted {
            Some(name) => branch.name == *name,
            None => branch.name.starts_with(&prefix),
        };
        if !selected {
            continue;
        }
        let short = branch.name[prefix.len()..].to_string();
        branches.push(TrackingBranchView {
            location: repo.location(OperationKind::Remote, &[remote.as_str(), short.as_str()], None)?,
            commit_location: repo.location(OperationKind::Commit, &[branch.name.as_str()], None)?,
            name: branch.name,
            full_name: branch.full_name,
            id: branch.target,
        });
    }
    if let (Some(name), true) = (&wanted, branches.is_empty()) {
        return Err(GatewayError::NotFound(format!("no remote branch '{name}'")));
    }

    let mut view = remote_view(repo, entry)?;
    view.children = Some(branches);
    Ok(view)
}

/// Description of a served clone.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CloneView {
    #[serde(rename = "Type")]
    pub kind: &'static str,
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Oid>,
    pub repository_state: &'static str,
    pub remotes: Vec<RemoteView>,
    pub status_location: String,
    pub commit_location: String,
    pub branch_location: String,
    pub tag_location: String,
    pub remote_location: String,
    pub config_location: String,
    pub index_location: String,
    pub diff_location: String,
}

pub fn describe_clone(repo: &Repo) -> Result<CloneView, GatewayError> {
    let git = repo.git();
    let remotes = git
        .list_remotes()?
        .into_iter()
        .map(|r| remote_view(repo, r))
        .collect::<Result<_, _>>()?;
    Ok(CloneView {
        kind: "Clone",
        id: repo.name().to_string(),
        name: repo.name().to_string(),
        location: repo.location(OperationKind::Clone, &[], None)?,
        branch: git.current_branch()?.map(|b| b.to_string()),
        head: git.head_oid()?,
        repository_state: git.state().wire_name(),
        remotes,
        status_location: repo.location(OperationKind::Status, &[], None)?,
        commit_location: repo.location(OperationKind::Commit, &["HEAD"], None)?,
        branch_location: repo.location(OperationKind::Branch, &[], None)?,
        tag_location: repo.location(OperationKind::Tag, &[], None)?,
        remote_location: repo.location(OperationKind::Remote, &[], None)?,
        config_location: repo.location(OperationKind::Config, &[], None)?,
        index_location: repo.location(OperationKind::Index, &[], None)?,
        diff_location: repo.location(OperationKind::Diff, &["Default"], None)?,
    })
}
