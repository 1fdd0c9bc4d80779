//! engine::orchestrator
//!
//! State machines for operations that can stop half-way: merge, rebase,
//! cherry-pick, checkout and revert.
//!
//! # Architecture
//!
//! `POST commit/HEAD/file/{repo}/` carries one of five bodies. They are
//! decoded into a single [`CommitPost`] and classified by
//! [`CommitPost::into_action`]; [`apply`] then runs the action against an
//! open repository and returns the JSON body of the response.
//!
//! # Invariants
//!
//! - Expected stops (conflicts, dirty paths, wrong state) are results, not
//!   errors: they are reported in the body with a closed status enum
//! - A `FAILED` result means nothing was attempted
//! - Rebase state is read from and written to the repository only while
//!   the repository lock is held
//! - Each entry point takes the repository lock itself; none calls another
//!   while holding it

pub mod checkout;
pub mod cherry_pick;
pub mod merge;
pub mod rebase;
pub mod revert;

use serde::Deserialize;
use serde_json::Value;

pub use checkout::CheckoutBody;
pub use cherry_pick::{CherryPickOutcome, CherryPickStatus};
pub use merge::{FailureReason, MergeOutcome, MergeStatus};
pub use rebase::{RebaseOperation, RebaseOutcome, RebaseState, RebaseStatus};
pub use revert::{RevertOutcome, RevertStatus};

use super::error::GatewayError;
use super::{history, require_head, Repo};
use crate::core::address::ResourceAddress;
use crate::git::{CommitRequest, Person};

/// Body of `POST commit/HEAD/...`, in any of its forms.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommitPost {
    pub message: Option<String>,
    #[serde(default)]
    pub amend: bool,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
    pub merge: Option<String>,
    #[serde(default)]
    pub squash: bool,
    pub rebase: Option<String>,
    pub operation: Option<RebaseOperation>,
    pub revert: Option<String>,
    #[serde(rename = "Cherry-Pick")]
    pub cherry_pick: Option<String>,
}

/// What a [`CommitPost`] asks for.
#[derive(Debug, Clone)]
pub enum CommitAction {
    Commit(CommitRequest),
    Merge { target: String, squash: bool },
    Rebase { upstream: String, operation: RebaseOperation },
    Revert { commit: String },
    CherryPick { commit: String },
}

impl CommitPost {
    pub fn into_action(self) -> Result<CommitAction, GatewayError> {
        let selected = [
            self.merge.is_some(),
            self.rebase.is_some(),
            self.revert.is_some(),
            self.cherry_pick.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if selected > 1 {
            return Err(GatewayError::BadRequest(
                "give only one of Merge, Rebase, Revert or Cherry-Pick".into(),
            ));
        }

        if let Some(target) = self.merge {
            return Ok(CommitAction::Merge {
                target,
                squash: self.squash,
            });
        }
        if let Some(upstream) = self.rebase {
            return Ok(CommitAction::Rebase {
                upstream,
                operation: self.operation.unwrap_or_default(),
            });
        }
        if let Some(commit) = self.revert {
            return Ok(CommitAction::Revert { commit });
        }
        if let Some(commit) = self.cherry_pick {
            return Ok(CommitAction::CherryPick { commit });
        }

        let message = self
            .message
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| GatewayError::BadRequest("Message must be provided".into()))?;
        Ok(CommitAction::Commit(CommitRequest {
            message,
            amend: self.amend,
            author: person("Author", self.author_name, self.author_email)?,
            committer: person("Committer", self.committer_name, self.committer_email)?,
        }))
    }
}

fn person(role: &str, name: Option<String>, email: Option<String>) -> Result<Option<Person>, GatewayError> {
    match (name, email) {
        (None, None) => Ok(None),
        (Some(name), Some(email)) => Ok(Some(Person::new(name, email))),
        _ => Err(GatewayError::BadRequest(format!(
            "{role}Name and {role}Email must be given together"
        ))),
    }
}

/// Run `action` on HEAD and return the response body.
pub fn apply(repo: &Repo, address: &ResourceAddress, action: CommitAction) -> Result<Value, GatewayError> {
    require_head(address)?;
    let body = match action {
        CommitAction::Commit(mut request) => {
            if request.committer.is_none() {
                request.committer = repo.identity();
            }
            let node = history::create_commit(repo, &request)?;
            serde_json::to_value(node)
        }
        CommitAction::Merge { target, squash } => serde_json::to_value(merge::merge(repo, &target, squash)?),
        CommitAction::Rebase {
            upstream,
            operation,
        } => serde_json::to_value(rebase::rebase(repo, Some(&upstream), operation)?),
        CommitAction::Revert { commit } => serde_json::to_value(revert::revert(repo, &commit)?),
        CommitAction::CherryPick { commit } => serde_json::to_value(cherry_pick::cherry_pick(repo, &commit)?),
    };
    body.map_err(|e| GatewayError::Engine(format!("encoding response: {e}")))
}
