//! core
//!
//! Core domain types, addressing, configuration and guards.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, RefName, TaskId
//! - [`address`] - Resource address grammar (parse/build)
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for gateway storage
//! - [`ops`] - Per-repository lock
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Addresses, not file-system paths, are the unit of identity
//! - Nothing in here touches git2

pub mod address;
pub mod config;
pub mod ops;
pub mod paths;
pub mod types;
