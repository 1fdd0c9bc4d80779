//! engine::error
//!
//! The gateway's failure taxonomy and its wire form.
//!
//! Every failure a client can observe, whether returned directly or stored
//! in a failed task, is a [`GatewayError`] rendered as a [`ServerStatus`]:
//!
//! | Variant | HTTP |
//! |---|---|
//! | `BadRequest`, `Address` | 400 |
//! | `Unauthorized` | 401 |
//! | `NotFound` | 404 |
//! | `Conflict` | 409 |
//! | `Engine` | 500 |
//!
//! Conflicts are expected outcomes, not faults: they carry the colliding
//! paths so the client can resolve them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::address::AddressError;
use crate::core::config::ConfigError;
use crate::core::ops::lock::LockError;
use crate::core::types::TypeError;
use crate::git::GitError;

/// Errors surfaced to clients.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed request body or parameter.
    #[error("{0}")]
    BadRequest(String),

    /// Malformed or ineligible resource address.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// The address resolves to nothing.
    #[error("{0}")]
    NotFound(String),

    /// The operation cannot proceed without manual resolution.
    #[error("{message}")]
    Conflict {
        message: String,
        /// Human-readable elaboration (e.g. the colliding paths)
        detail: Option<String>,
        paths: Vec<String>,
    },

    /// Transport credentials were missing or refused.
    #[error("{0}")]
    Unauthorized(String),

    /// Unexpected failure inside the engine.
    #[error("{0}")]
    Engine(String),
}

impl GatewayError {
    /// Conflict raised by a checkout that would overwrite local changes.
    pub fn checkout_conflict(paths: Vec<String>) -> Self {
        let mut detail = String::from("Checkout conflict with files: ");
        for path in &paths {
            detail.push('\n');
            detail.push_str(path);
        }
        GatewayError::Conflict {
            message: "Checkout aborted".to_string(),
            detail: Some(detail),
            paths,
        }
    }

    pub fn http_code(&self) -> u16 {
        match self {
            GatewayError::BadRequest(_) | GatewayError::Address(_) => 400,
            GatewayError::Unauthorized(_) => 401,
            GatewayError::NotFound(_) => 404,
            GatewayError::Conflict { .. } => 409,
            GatewayError::Engine(_) => 500,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::BadRequest(_) => "BAD_REQUEST",
            GatewayError::Address(_) => "BAD_ADDRESS",
            GatewayError::Unauthorized(_) => "UNAUTHORIZED",
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::Conflict { .. } => "CONFLICT",
            GatewayError::Engine(_) => "ENGINE_FAULT",
        }
    }

    /// Wire form of this error.
    pub fn to_status(&self) -> ServerStatus {
        let (detailed_message, json_data) = match self {
            GatewayError::Conflict { detail, paths, .. } => (
                detail.clone(),
                (!paths.is_empty()).then(|| serde_json::json!({ "Paths": paths })),
            ),
            _ => (None, None),
        };
        ServerStatus {
            severity: Severity::Error,
            http_code: self.http_code(),
            code: self.code().to_string(),
            message: self.to_string(),
            detailed_message,
            json_data,
        }
    }
}

impl From<GitError> for GatewayError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NotARepo { .. }
            | GitError::RefNotFound { .. }
            | GitError::ObjectNotFound { .. }
            | GitError::PathNotFound { .. } => GatewayError::NotFound(err.to_string()),
            GitError::InvalidOid { .. } | GitError::InvalidRefName { .. } | GitError::InvalidArgument { .. } => {
                GatewayError::BadRequest(err.to_string())
            }
            GitError::CheckoutConflict { paths } => GatewayError::checkout_conflict(paths),
            GitError::RefExists { .. } | GitError::Unmerged | GitError::OperationInProgress { .. } => {
                GatewayError::Conflict {
                    message: err.to_string(),
                    detail: None,
                    paths: Vec::new(),
                }
            }
            GitError::Auth { .. } => GatewayError::Unauthorized(err.to_string()),
            GitError::BareRepo
            | GitError::NotFastForward { .. }
            | GitError::Cancelled
            | GitError::AccessError { .. }
            | GitError::Internal { .. } => GatewayError::Engine(err.to_string()),
        }
    }
}

impl From<TypeError> for GatewayError {
    fn from(err: TypeError) -> Self {
        GatewayError::BadRequest(err.to_string())
    }
}

impl From<ConfigError> for GatewayError {
    fn from(err: ConfigError) -> Self {
        GatewayError::Engine(err.to_string())
    }
}

impl From<LockError> for GatewayError {
    fn from(err: LockError) -> Self {
        GatewayError::Engine(err.to_string())
    }
}

/// Severity of a [`ServerStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

/// Machine-readable status payload carried by every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerStatus {
    pub severity: Severity,
    pub http_code: u16,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detailed_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub json_data: Option<serde_json::Value>,
}
