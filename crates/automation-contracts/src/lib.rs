//! The contract catalog.
//!
//! A closed set of contract kinds ([`ContractKind`]), each able to
//! `deploy` a fresh instance from on-disk artifacts or `connect` to an
//! existing address. Kind-specific operations (minting LINK, configuring
//! the registry, driving verifiable-load upkeeps) live in the per-kind
//! modules and all go through a [`Catalog`].

pub mod abi;
pub mod artifacts;
pub mod catalog;
pub mod error;
pub mod feed;
pub mod link;
pub mod registrar;
pub mod registry;
pub mod verifiable_load;

pub use artifacts::ArtifactStore;
pub use catalog::{Catalog, ContractKind};
pub use error::{ContractError, ContractResult};
pub use feed::{FeedDeploy, FeedKind};
pub use registrar::RegistrarDeploy;
pub use registry::{OracleIdentity, RegistryDeploy};
pub use verifiable_load::{RegisterUpkeeps, UpkeepStats, VerifiableLoadDeploy};
