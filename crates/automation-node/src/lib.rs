//! Bring-up of automation node containers.
//!
//! Drives a [`ContainerEngine`] (the `docker` CLI in production, an
//! in-memory [`FakeEngine`] in tests) to run each node with its database,
//! then configures the node over its HTTP API:
//!
//! ```text
//! image → network → inspect → [reset] → database → secrets → node
//!       → health → session → keys → job
//! ```

pub mod client;
pub mod docker;
pub mod engine;
pub mod error;
pub mod fake;
pub mod health;
pub mod jobs;
pub mod orchestrator;
pub mod secrets;

pub use client::{JobSummary, NodeClient};
pub use docker::DockerCli;
pub use engine::{ContainerEngine, ContainerSpec, ContainerSummary};
pub use error::{NodeError, NodeResult};
pub use fake::FakeEngine;
pub use orchestrator::{
    BringUp, NodeRole, NodeState, Observed, Orchestrator, OrchestratorSettings,
};
pub use secrets::MercuryCredentials;
