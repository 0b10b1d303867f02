//! State model and persistence for the automation CLI.
//!
//! Holds everything that outlives a single command: the per-environment
//! record (chain parameters, contract addresses, node roster, protocol
//! tuning), the process-wide key vault, and the on-disk store that reads
//! and rewrites both as whole documents.
//!
//! # Layout
//!
//! ```text
//! <state-directory>/
//!   keys.json                      KeyVault
//!   <env>/config.toml              Environment
//!   <env>/bootstrap/secrets/...    node files written by automation-node
//!   <env>/participant-<i>/secrets/...
//! ```
//!
//! The store never caches: a command loads, mutates in memory, and saves
//! once. Last writer wins.

pub mod duration;
pub mod error;
pub mod fields;
pub mod parallel;
pub mod store;
pub mod types;
pub mod vault;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
pub use vault::{Key, KeyVault};
