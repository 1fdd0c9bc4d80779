//! core::ops
//!
//! Repository-scoped operation guards.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive per-repository lock

pub mod lock;

pub use lock::{LockError, RepoLock};
