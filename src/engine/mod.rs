//! engine
//!
//! Orchestrates gateway operations on top of the [`Git`] interface.
//!
//! # Architecture
//!
//! The engine is the layer between the HTTP surface and the git layer. It
//! owns no repository state of its own; every request opens the addressed
//! repository afresh through [`Gateway::open`] and works on it via the
//! operation modules:
//!
//! - [`status`]: per-scope working tree / index / HEAD classification
//! - [`diff`]: diffs between commits, the index and the working tree
//! - [`orchestrator`]: merge, rebase, cherry-pick, checkout and revert
//!   state machines
//! - [`history`]: paged log, blame, historic content, commits
//! - [`index`]: staging, unstaging and reset
//! - [`stash`]: saving and restoring local changes
//! - [`refs`]: branch, tag and config resources
//! - [`remote`]: clone, fetch, pull and push jobs, remote configuration
//! - [`tasks`]: the registry running long operations asynchronously
//!
//! # Invariants
//!
//! - An address resolves to exactly one repository directly below the root
//! - Reads never modify the repository
//! - HEAD, the index and the working tree only change while the
//!   repository's lock is held; the lock is never taken twice on one path
//! - Every failure is a [`GatewayError`]
//!
//! # Example
//!
//! ```ignore
//! use gitgate::core::address::ResourceAddress;
//! use gitgate::engine::{status, Gateway};
//!
//! let gateway = Gateway::new("/srv/repos".into(), config);
//! let address = ResourceAddress::parse("/gitapi/status/file/demo/")?;
//! let repo = gateway.open(&address)?;
//! let snapshot = status::compute_status(&repo, &address)?;
//! ```

pub mod diff;
pub mod error;
pub mod history;
pub mod index;
pub mod orchestrator;
pub mod refs;
pub mod remote;
pub mod stash;
pub mod status;
pub mod tasks;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use error::{GatewayError, ServerStatus, Severity};
pub use tasks::{CancelToken, Outcome, TaskHandle, TaskKind, TaskRegistry, TaskSnapshot, TaskState};

use crate::core::address::{OperationKind, ResourceAddress};
use crate::core::config::Config;
use crate::core::ops::lock::RepoLock;
use crate::core::paths::{served_repository, GatewayPaths};
use crate::git::{Git, GitError, Person};

/// A blocking unit of work run by the task registry.
pub type Job = Box<dyn FnOnce(&CancelToken) -> Result<Outcome, GatewayError> + Send + 'static>;

/// Result of running a long operation with a bounded wait.
#[derive(Debug)]
pub enum TaskReply {
    /// The task reached a terminal state within the wait
    Finished(TaskSnapshot),
    /// Still queued or running; the client should poll
    Pending(TaskSnapshot),
}

/// The gateway: served root, configuration and task registry.
#[derive(Debug)]
pub struct Gateway {
    root: PathBuf,
    config: Config,
    tasks: TaskRegistry,
}

impl Gateway {
    /// Create a gateway serving the repositories below `root`.
    ///
    /// Must be called inside a tokio runtime only if tasks are submitted.
    pub fn new(root: PathBuf, config: Config) -> Self {
        let tasks = TaskRegistry::new(config.max_workers(), config.task_retention());
        Self { root, config, tasks }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    /// Directory a repository named `name` lives (or would live) in.
    pub fn repository_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Open the repository an address names.
    pub fn open(&self, address: &ResourceAddress) -> Result<Repo, GatewayError> {
        self.open_named(address.repository())
    }

    /// Open the served repository `name`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NotFound`] if `name` is not a non-bare repository
    /// directly below the root.
    pub fn open_named(&self, name: &str) -> Result<Repo, GatewayError> {
        let missing = || GatewayError::NotFound(format!("no repository named '{name}'"));
        let dir = served_repository(&self.root, name).ok_or_else(missing)?;
        let git = Git::open(&dir).map_err(|e| match e {
            GitError::NotARepo { .. } | GitError::BareRepo => missing(),
            other => other.into(),
        })?;

        let paths = GatewayPaths::new(git.git_dir().to_path_buf());
        let config = match self.config.for_repository(&paths) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(repository = name, error = %err, "ignoring unreadable repository config");
                self.config.clone()
            }
        };

        Ok(Repo {
            git,
            name: name.to_string(),
            paths,
            config,
        })
    }

    /// Submit `job` and wait up to the configured task wait for it to end.
    pub async fn run_task(&self, kind: TaskKind, job: Job) -> Result<TaskReply, GatewayError> {
        self.run_task_with_wait(kind, job, self.config.task_wait()).await
    }

    /// [`Gateway::run_task`] with an explicit wait.
    pub async fn run_task_with_wait(
        &self,
        kind: TaskKind,
        job: Job,
        wait: Duration,
    ) -> Result<TaskReply, GatewayError> {
        let handle = self.tasks.submit(kind, job);
        let id = handle.id().clone();
        let snapshot = self
            .tasks
            .wait(handle, wait)
            .await
            .ok_or_else(|| GatewayError::Engine(format!("task {id} vanished")))?;
        if snapshot.state.is_terminal() {
            Ok(TaskReply::Finished(snapshot))
        } else {
            Ok(TaskReply::Pending(snapshot))
        }
    }
}

/// An open served repository.
#[derive(Debug)]
pub struct Repo {
    git: Git,
    name: String,
    paths: GatewayPaths,
    config: Config,
}

impl Repo {
    pub fn git(&self) -> &Git {
        &self.git
    }

    /// Repository name as it appears in addresses.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn paths(&self) -> &GatewayPaths {
        &self.paths
    }

    /// Effective configuration (global merged with this repository's).
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Take the single-writer lock. Hold it while changing HEAD, the index
    /// or the working tree.
    pub fn lock(&self) -> Result<RepoLock, GatewayError> {
        Ok(RepoLock::acquire(&self.paths)?)
    }

    /// Configured committer identity, if any. `None` defers to git config.
    pub fn identity(&self) -> Option<Person> {
        self.config
            .identity()
            .map(|(name, email)| Person::new(name, email))
    }

    /// Address of a resource in this repository.
    ///
    /// `path` is repository-relative; a trailing `/` marks a folder.
    pub fn location(&self, kind: OperationKind, scope: &[&str], path: Option<&str>) -> Result<String, GatewayError> {
        let scope = scope.iter().map(|s| s.to_string()).collect();
        let mut address = ResourceAddress::new(kind, scope, self.name.clone())?;
        if let Some(path) = path {
            address = address.with_path(path)?;
        }
        Ok(address.build())
    }
}

/// Reject a request whose scope is not `HEAD`.
pub(crate) fn require_head(address: &ResourceAddress) -> Result<(), GatewayError> {
    match address.ref_or_commit() {
        Some("HEAD") => Ok(()),
        other => Err(GatewayError::BadRequest(format!(
            "this operation applies to HEAD only, not '{}'",
            other.unwrap_or_default()
        ))),
    }
}
