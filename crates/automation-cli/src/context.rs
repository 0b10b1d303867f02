//! Per-invocation context threaded through every command.
//!
//! Holds the state store, the selected environment and key override, and
//! the cancellation token. Chain and container backends are created on
//! demand; tests inject fakes through [`Context::with_chain`] and
//! [`Context::with_engine`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use automation_chain::{Deployer, EvmClient, GatewayConfig, RpcClient};
use automation_contracts::{ArtifactStore, Catalog};
use automation_core::store::expand_home;
use automation_core::{Environment, Key, KeyVault, StateStore};
use automation_node::{ContainerEngine, DockerCli, Orchestrator, OrchestratorSettings};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::GlobalOptions;
use crate::error::WorkflowError;

pub struct Context {
    store: StateStore,
    environment: String,
    key: String,
    cancel: CancellationToken,
    chain: Option<Arc<dyn EvmClient>>,
    engine: Option<Arc<dyn ContainerEngine>>,
}

impl Context {
    pub fn new(global: &GlobalOptions, cancel: CancellationToken) -> Self {
        Self {
            store: StateStore::from_user_path(&global.state_directory),
            environment: global.environment.clone(),
            key: global.key.clone(),
            cancel,
            chain: None,
            engine: None,
        }
    }

    /// Use `client` instead of connecting to the environment's RPC URL.
    pub fn with_chain(mut self, client: Arc<dyn EvmClient>) -> Self {
        self.chain = Some(client);
        self
    }

    /// Use `engine` instead of the docker CLI.
    pub fn with_engine(mut self, engine: Arc<dyn ContainerEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn environment_name(&self) -> &str {
        &self.environment
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn load_environment(&self) -> anyhow::Result<Environment> {
        self.store
            .load_environment(&self.environment)
            .with_context(|| format!("loading environment {}", self.environment))
    }

    /// Check invariants, then persist `env`.
    pub fn save_environment(&self, env: &Environment) -> anyhow::Result<()> {
        env.validate()
            .with_context(|| format!("refusing to save environment {}", self.environment))?;
        self.store
            .save_environment(&self.environment, env)
            .with_context(|| format!("saving environment {}", self.environment))
    }

    pub fn load_vault(&self) -> anyhow::Result<KeyVault> {
        self.store.load_key_vault().context("loading key vault")
    }

    pub fn save_vault(&self, vault: &KeyVault) -> anyhow::Result<()> {
        self.store.save_key_vault(vault).context("saving key vault")
    }

    /// The signing key: `--key` when given, else the environment's alias.
    pub fn signing_key(&self, env: &Environment) -> anyhow::Result<Key> {
        let vault = self.load_vault()?;
        let alias = if self.key.is_empty() {
            env.private_key_alias.as_str()
        } else {
            self.key.as_str()
        };
        vault
            .resolve(alias, &env.private_key_alias)
            .cloned()
            .ok_or_else(|| WorkflowError::KeyNotFound(alias.to_string()).into())
    }

    /// Key a node is configured to import, if any.
    pub fn node_key(&self, alias: Option<&str>) -> anyhow::Result<Option<Key>> {
        let Some(alias) = alias else {
            return Ok(None);
        };
        let vault = self.load_vault()?;
        vault
            .get(alias)
            .cloned()
            .map(Some)
            .ok_or_else(|| WorkflowError::KeyNotFound(alias.to_string()).into())
    }

    pub async fn chain_client(&self, env: &Environment) -> anyhow::Result<Arc<dyn EvmClient>> {
        if let Some(client) = &self.chain {
            return Ok(client.clone());
        }
        let client = RpcClient::connect(&env.http_url, env.chain_id)
            .await
            .with_context(|| format!("connecting to {}", env.http_url))?;
        Ok(Arc::new(client))
    }

    pub async fn deployer(&self, env: &Environment) -> anyhow::Result<Deployer> {
        let key = self.signing_key(env)?;
        let client = self.chain_client(env).await?;
        let mut config = GatewayConfig::new(env.chain_id);
        config.gas_limit = env.deployer_gas_limit;
        config.gas_premium_percent = env.gas_price_premium_percent;
        let deployer = Deployer::new(client, &key.value, config)
            .with_context(|| format!("loading key {}", key.alias))?;
        debug!(address = %deployer.address(), alias = %key.alias, "deployer ready");
        Ok(deployer)
    }

    pub fn artifacts_directory(&self, env: &Environment) -> PathBuf {
        match &env.artifacts_directory {
            Some(dir) => expand_home(dir),
            None => self.store.root().join("artifacts"),
        }
    }

    pub async fn catalog(&self, env: &Environment) -> anyhow::Result<Catalog> {
        let deployer = self.deployer(env).await?;
        Ok(Catalog::new(
            deployer,
            ArtifactStore::new(self.artifacts_directory(env)),
        ))
    }

    pub fn orchestrator(&self, env: &Environment) -> Orchestrator {
        let engine = self
            .engine
            .clone()
            .unwrap_or_else(|| Arc::new(DockerCli::default()) as Arc<dyn ContainerEngine>);
        Orchestrator::new(engine, OrchestratorSettings::from_environment(env))
    }

    /// Directory receiving a node's files.
    pub fn node_dir(&self, node: &str) -> PathBuf {
        self.store.node_dir(&self.environment, node)
    }
}
