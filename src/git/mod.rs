//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. All repository reads and
//! writes flow through [`Git`]; no other module imports `git2` or reads
//! files under `.git` directly.
//!
//! The interface is split by operation family, each file adding an
//! `impl Git` block:
//!
//! - `interface`: opening, state detection, ref resolution, ancestry
//! - `worktree`: per-path status, path and branch checkout, staging, reset
//! - `diff`: differences between commits, the index and the working tree
//! - `commit`: recording the index, amending
//! - `merge`: merge analysis, fast-forward, content merge, revert,
//!   cherry-pick
//! - `rebase`: replay with on-disk progress (begin/continue/skip/abort)
//! - `history`: log walks, blame, historic blobs, ref labels
//! - `refs`: branch, tag and repository config CRUD
//! - `remote`: clone, fetch, push, remote configuration
//! - `stash`: save, list, apply, drop
//!
//! # Invariants
//!
//! - No other module calls git2 directly
//! - All operations return strong types (Oid, BranchName, RefName)
//! - libgit2 failures are normalized into [`GitError`] categories
//!
//! # Example
//!
//! ```ignore
//! use gitgate::git::{DiffSide, Git};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("/srv/git/project"))?;
//! let head = git.head_oid()?.expect("born HEAD");
//! let diff = git.diff(&DiffSide::Commit(head), &DiffSide::WorkTree, &[])?;
//! print!("{}", diff.patch);
//! ```

mod commit;
mod diff;
mod history;
mod interface;
mod merge;
mod rebase;
mod refs;
mod remote;
mod stash;
mod worktree;

pub use commit::CommitRequest;
pub use diff::{ChangeKind, DiffOutput, DiffSide, FileChange, DEV_NULL};
pub use history::{BlameHunk, LogQuery, RefLabels};
pub use interface::{CommitInfo, Git, GitError, GitState, Person, RepoInfo};
pub use merge::{CherryPickOutcome, MergeAnalysis, RevertOutcome};
pub use rebase::{RebaseInfo, RebaseProgress};
pub use refs::{BranchEntry, ConfigEntry, TagEntry};
pub use remote::{Credentials, PushSpec, RefUpdate, RemoteEntry, RemoteSpec, TransferOutcome, TransferStatus};
pub use stash::{StashEntry, StashRequest};
pub use worktree::{PathStatus, ResetMode};
