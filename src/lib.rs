//! gitgate - A REST gateway for git repositories
//!
//! gitgate serves the repositories below a directory over HTTP: status,
//! diff, log, blame, commit, merge, rebase, checkout, branch, tag, config,
//! and clone/fetch/push as pollable tasks.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, starts the server)
//! - [`server`] - axum router, request decoding, response encoding
//! - [`engine`] - Task registry, status/diff reporting, merge/rebase orchestration
//! - [`core`] - Domain types, resource addresses, configuration, locking
//! - [`git`] - Single interface for all Git operations
//!
//! # Correctness Invariants
//!
//! gitgate maintains the following invariants:
//!
//! 1. Every request names exactly one repository directly below the root
//! 2. Only the [`git`] module touches git2
//! 3. A task never stays running after its operation has returned
//! 4. Conflicts are reported as structured outcomes, never as faults

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod server;
