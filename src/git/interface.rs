//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to all Git operations in the
//! gateway. The `Git` struct wraps one opened repository; the sibling
//! modules add operation families to it (`impl Git` blocks in `diff`,
//! `merge`, `rebase`, `remote`, ...). Everything returns plain data and
//! normalizes libgit2 failures into [`GitError`].
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Directory is not a repository
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::CheckoutConflict`]: Uncommitted work would be overwritten
//! - [`GitError::NotFastForward`]: Remote refused a non-fast-forward update
//! - [`GitError::Auth`]: Transport credentials were refused
//! - [`GitError::Cancelled`]: A progress callback asked libgit2 to stop

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{BranchName, Oid, TypeError, UtcTimestamp};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Directory is not a git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref or revision does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Path does not exist at the requested revision.
    #[error("path not found: {path}")]
    PathNotFound {
        /// Repository-relative path
        path: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// A ref that should be created already exists.
    #[error("ref already exists: {refname}")]
    RefExists {
        /// The ref that exists
        refname: String,
    },

    /// Checkout would overwrite uncommitted changes.
    #[error("checkout conflict with files: {}", paths.join(", "))]
    CheckoutConflict {
        /// Colliding paths, repository-relative
        paths: Vec<String>,
    },

    /// Index still holds unresolved conflicts.
    #[error("index contains unmerged entries")]
    Unmerged,

    /// Remote refused a non-fast-forward update.
    #[error("non-fast-forward update rejected: {message}")]
    NotFastForward {
        /// Transport message
        message: String,
    },

    /// Credentials rejected or missing.
    #[error("authentication failed: {message}")]
    Auth {
        /// Transport message
        message: String,
    },

    /// A progress callback stopped the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Git operation in progress (rebase, merge, etc.).
    #[error("{operation} in progress")]
    OperationInProgress {
        /// The type of operation in progress
        operation: GitState,
    },

    /// A caller-supplied value git refuses (config key, remote name, ...).
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem
        message: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    pub(super) fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if err.class() == git2::ErrorClass::Reference
                    || context.starts_with("refs/")
                    || context.contains("ref")
                {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec | git2::ErrorCode::Ambiguous => GitError::RefNotFound {
                refname: context.to_string(),
            },
            git2::ErrorCode::Exists => GitError::RefExists {
                refname: context.to_string(),
            },
            git2::ErrorCode::Conflict => GitError::CheckoutConflict { paths: Vec::new() },
            git2::ErrorCode::Unmerged => GitError::Unmerged,
            git2::ErrorCode::NotFastForward => GitError::NotFastForward {
                message: err.message().to_string(),
            },
            git2::ErrorCode::Auth | git2::ErrorCode::Certificate => GitError::Auth {
                message: err.message().to_string(),
            },
            git2::ErrorCode::User => GitError::Cancelled,
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        let context = err.message().to_string();
        GitError::from_git2(err, &context)
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidRefName(msg)
            | TypeError::InvalidBranchName(msg)
            | TypeError::InvalidTaskId(msg) => GitError::InvalidRefName { message: msg },
        }
    }
}

/// Information about a Git repository.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Path to .git directory
    pub git_dir: PathBuf,
    /// Path to working directory
    pub work_dir: PathBuf,
}

/// State of in-progress Git operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitState {
    /// No operation in progress.
    Clean,
    /// Rebase in progress.
    Rebase,
    /// Merge in progress.
    Merge,
    /// Cherry-pick in progress.
    CherryPick,
    /// Revert in progress.
    Revert,
    /// Bisect in progress.
    Bisect,
    /// Apply mailbox in progress.
    ApplyMailbox,
}

impl GitState {
    /// Check if any operation is in progress.
    ///
    /// # Example
    ///
    /// ```
    /// use gitgate::git::GitState;
    ///
    /// assert!(!GitState::Clean.is_in_progress());
    /// assert!(GitState::Rebase.is_in_progress());
    /// ```
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, GitState::Clean)
    }

    /// Wire name used in status responses.
    pub fn wire_name(&self) -> &'static str {
        match self {
            GitState::Clean => "SAFE",
            GitState::Rebase => "REBASING",
            GitState::Merge => "MERGING",
            GitState::CherryPick => "CHERRY_PICKING",
            GitState::Revert => "REVERTING",
            GitState::Bisect => "BISECTING",
            GitState::ApplyMailbox => "APPLY",
        }
    }
}

impl std::fmt::Display for GitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GitState::Clean => "clean",
            GitState::Rebase => "rebase",
            GitState::Merge => "merge",
            GitState::CherryPick => "cherry-pick",
            GitState::Revert => "revert",
            GitState::Bisect => "bisect",
            GitState::ApplyMailbox => "apply-mailbox",
        };
        f.write_str(s)
    }
}

/// A name/email pair used for author or committer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    pub email: String,
}

impl Person {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Information about a commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// The commit OID
    pub oid: Oid,
    /// Parent OIDs in order
    pub parents: Vec<Oid>,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    pub author: Person,
    pub committer: Person,
    /// Committer timestamp
    pub time: UtcTimestamp,
}

/// The Git interface.
///
/// This is the **single point of interaction** with Git. No other module
/// imports `git2`.
pub struct Git {
    /// The underlying git2 repository
    pub(super) repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open the repository whose working directory is exactly `path`.
    ///
    /// Unlike discovery, parent directories are never searched: a served
    /// repository must be addressed by its own root.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if `path` is not a repository root
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self { repo })
    }

    /// Get repository information (git_dir and work_dir paths).
    pub fn info(&self) -> Result<RepoInfo, GitError> {
        let git_dir = self.repo.path().to_path_buf();
        let work_dir = self.repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();

        Ok(RepoInfo { git_dir, work_dir })
    }

    /// Get direct access to the .git directory path.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Working directory of the repository.
    pub fn work_dir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or(GitError::BareRepo)
    }

    // =========================================================================
    // State Detection
    // =========================================================================

    /// Get the current Git state (rebase, merge, etc.).
    pub fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge => GitState::Rebase,
            git2::RepositoryState::Merge => GitState::Merge,
            git2::RepositoryState::CherryPick | git2::RepositoryState::CherryPickSequence => {
                GitState::CherryPick
            }
            git2::RepositoryState::Revert | git2::RepositoryState::RevertSequence => {
                GitState::Revert
            }
            git2::RepositoryState::Bisect => GitState::Bisect,
            git2::RepositoryState::ApplyMailbox | git2::RepositoryState::ApplyMailboxOrRebase => {
                GitState::ApplyMailbox
            }
        }
    }

    /// Check if there are unresolved conflicts in the index.
    pub fn has_conflicts(&self) -> Result<bool, GitError> {
        Ok(self.repo.index()?.has_conflicts())
    }

    /// Paths with conflict entries in the index, sorted.
    pub fn conflicted_paths(&self) -> Result<Vec<String>, GitError> {
        let index = self.repo.index()?;
        let mut paths = Vec::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
            if let Some(entry) = entry {
                paths.push(String::from_utf8_lossy(&entry.path).into_owned());
            }
        }
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve any revision expression (`HEAD`, `main`, `origin/main`, an
    /// abbreviated or full id) to a commit id.
    pub fn resolve_commit(&self, spec: &str) -> Result<Oid, GitError> {
        let object = self
            .repo
            .revparse_single(spec)
            .map_err(|e| GitError::from_git2(e, spec))?;
        let commit = object
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, spec))?;
        from_git2_oid(commit.id())
    }

    /// Resolve a revision, returning None if it doesn't exist.
    pub fn try_resolve_commit(&self, spec: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_commit(spec) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. } | GitError::ObjectNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get HEAD commit OID. `None` while HEAD is unborn.
    pub fn head_oid(&self) -> Result<Option<Oid>, GitError> {
        match self.repo.head() {
            Ok(head) => {
                let commit = head
                    .peel_to_commit()
                    .map_err(|e| GitError::from_git2(e, "HEAD"))?;
                Ok(Some(from_git2_oid(commit.id())?))
            }
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(GitError::from_git2(e, "HEAD")),
        }
    }

    /// Check if a ref exists.
    pub fn ref_exists(&self, refname: &str) -> bool {
        self.repo.find_reference(refname).is_ok()
    }

    /// Get the current branch name, if on a branch.
    ///
    /// Returns `None` if HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }

        Ok(None)
    }

    // =========================================================================
    // Ancestry Queries
    // =========================================================================

    /// Find the merge base of two commits.
    pub fn merge_base(&self, a: &Oid, b: &Oid) -> Result<Option<Oid>, GitError> {
        match self.repo.merge_base(to_git2_oid(a)?, to_git2_oid(b)?) {
            Ok(base) => Ok(Some(from_git2_oid(base)?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether `ancestor` is reachable from `descendant` (or equal).
    pub fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(self
            .repo
            .graph_descendant_of(to_git2_oid(descendant)?, to_git2_oid(ancestor)?)?)
    }

    // =========================================================================
    // Commit Information
    // =========================================================================

    /// Get information about a commit.
    pub fn commit_info(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2_oid(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        commit_info_of(&commit)
    }

    /// Signature for commits made on behalf of the gateway.
    ///
    /// An explicit identity wins over the repository's `user.name`/`user.email`.
    pub(super) fn signature(&self, who: Option<&Person>) -> Result<git2::Signature<'static>, GitError> {
        match who {
            Some(p) => Ok(git2::Signature::now(&p.name, &p.email)?),
            None => self.repo.signature().map_err(|e| GitError::Internal {
                message: format!("no committer identity configured: {}", e.message()),
            }),
        }
    }
}

// =============================================================================
// Conversions shared by the operation modules
// =============================================================================

pub(super) fn to_git2_oid(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|_| GitError::InvalidOid {
        oid: oid.to_string(),
    })
}

pub(super) fn from_git2_oid(oid: git2::Oid) -> Result<Oid, GitError> {
    Ok(Oid::new(oid.to_string())?)
}

pub(super) fn person_of(sig: &git2::Signature<'_>) -> Person {
    Person {
        name: String::from_utf8_lossy(sig.name_bytes()).into_owned(),
        email: String::from_utf8_lossy(sig.email_bytes()).into_owned(),
    }
}

pub(super) fn commit_info_of(commit: &git2::Commit<'_>) -> Result<CommitInfo, GitError> {
    let parents = commit
        .parent_ids()
        .map(from_git2_oid)
        .collect::<Result<Vec<_>, _>>()?;
    let message = String::from_utf8_lossy(commit.message_bytes()).into_owned();
    let summary = message.lines().next().unwrap_or_default().to_string();

    Ok(CommitInfo {
        oid: from_git2_oid(commit.id())?,
        parents,
        summary,
        message,
        author: person_of(&commit.author()),
        committer: person_of(&commit.committer()),
        time: UtcTimestamp::from_epoch_seconds(commit.time().seconds()),
    })
}
