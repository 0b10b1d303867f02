//! The closed set of contract kinds and the deployer they run against.

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolCall;
use automation_chain::{Deployer, TxReceipt};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::artifacts::ArtifactStore;
use crate::error::{ContractError, ContractResult};
use crate::feed::FeedDeploy;
use crate::registrar::RegistrarDeploy;
use crate::registry::RegistryDeploy;
use crate::verifiable_load::VerifiableLoadDeploy;
use crate::{feed, link, registrar, registry, verifiable_load};

/// A deployer paired with the artifacts it creates contracts from.
#[derive(Debug, Clone)]
pub struct Catalog {
    deployer: Deployer,
    artifacts: ArtifactStore,
}

impl Catalog {
    pub fn new(deployer: Deployer, artifacts: ArtifactStore) -> Self {
        Self {
            deployer,
            artifacts,
        }
    }

    pub fn deployer(&self) -> &Deployer {
        &self.deployer
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Deploy artifact `name` with ABI-encoded constructor arguments.
    ///
    /// Builds fresh transaction options, so consecutive creations take
    /// consecutive nonces.
    pub async fn create(
        &self,
        cancel: &CancellationToken,
        name: &str,
        constructor_args: Vec<u8>,
    ) -> ContractResult<Address> {
        let mut code = self.artifacts.bytecode(name)?.to_vec();
        code.extend_from_slice(&constructor_args);
        let address = self
            .deployer
            .deploy_code(cancel, Bytes::from(code))
            .await
            .map_err(|e| ContractError::from_deploy(name, e))?;
        info!(contract = name, %address, "contract deployed");
        Ok(address)
    }

    /// Send `call` to `to` and wait for inclusion.
    pub async fn transact<C: SolCall>(
        &self,
        cancel: &CancellationToken,
        to: Address,
        call: C,
    ) -> ContractResult<TxReceipt> {
        self.deployer
            .transact(cancel, to, Bytes::from(call.abi_encode()))
            .await
            .map_err(ContractError::from_chain)
    }

    /// Read-only `call` against `to`, decoding its return value.
    pub async fn call<C: SolCall>(
        &self,
        cancel: &CancellationToken,
        contract: &str,
        to: Address,
        call: C,
    ) -> ContractResult<C::Return> {
        let raw = self
            .deployer
            .call(cancel, to, Bytes::from(call.abi_encode()))
            .await
            .map_err(ContractError::from_chain)?;
        C::abi_decode_returns(&raw).map_err(|e| ContractError::decode(contract, e))
    }

    /// Fail with a connection error unless `address` holds code.
    pub async fn ensure_code(
        &self,
        cancel: &CancellationToken,
        contract: &str,
        address: Address,
    ) -> ContractResult<Address> {
        let code = self
            .deployer
            .code_at(cancel, address)
            .await
            .map_err(|e| match e {
                automation_chain::ChainError::Cancelled => ContractError::Cancelled,
                other => ContractError::Connection {
                    contract: contract.to_string(),
                    address: address.to_string(),
                    reason: other.to_string(),
                },
            })?;
        if code.is_empty() {
            return Err(ContractError::Connection {
                contract: contract.to_string(),
                address: address.to_string(),
                reason: "no contract code at address".to_string(),
            });
        }
        Ok(address)
    }
}

/// Every contract the CLI can deploy or bind to, with the configuration
/// its deployment needs.
#[derive(Debug, Clone)]
pub enum ContractKind {
    LinkToken,
    Feed(FeedDeploy),
    Registry(RegistryDeploy),
    Registrar(RegistrarDeploy),
    VerifiableLoad(VerifiableLoadDeploy),
}

impl ContractKind {
    /// Human-readable name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            ContractKind::LinkToken => "LinkToken",
            ContractKind::Feed(feed) => feed.kind.label(),
            ContractKind::Registry(_) => "Registry",
            ContractKind::Registrar(_) => "Registrar",
            ContractKind::VerifiableLoad(vl) => verifiable_load::label(vl.kind),
        }
    }

    /// Deploy a fresh instance and return its address.
    pub async fn deploy(
        &self,
        cancel: &CancellationToken,
        catalog: &Catalog,
    ) -> ContractResult<Address> {
        let address = match self {
            ContractKind::LinkToken => link::deploy(cancel, catalog).await?,
            ContractKind::Feed(cfg) => feed::deploy(cancel, catalog, cfg).await?,
            ContractKind::Registry(cfg) => registry::deploy(cancel, catalog, cfg).await?,
            ContractKind::Registrar(cfg) => registrar::deploy(cancel, catalog, cfg).await?,
            ContractKind::VerifiableLoad(cfg) => {
                verifiable_load::deploy(cancel, catalog, cfg).await?
            }
        };
        self.connect(cancel, address, catalog).await
    }

    /// Bind to an existing instance, confirming code is present.
    pub async fn connect(
        &self,
        cancel: &CancellationToken,
        address: Address,
        catalog: &Catalog,
    ) -> ContractResult<Address> {
        catalog.ensure_code(cancel, self.name(), address).await
    }
}
