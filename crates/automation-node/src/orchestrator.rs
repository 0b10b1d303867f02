//! Node bring-up.
//!
//! Every node is a pair of containers on the group network:
//!
//! ```text
//! <group>-<node>-postgres   database, alias <group>-<node>-postgres
//! <group>-<node>            automation node, API on 6688 published to the node port
//! ```
//!
//! [`Orchestrator::bring_up`] observes the pair, creates or starts what is
//! missing, then configures the node through its HTTP API. Running it twice
//! without `reset` leaves the containers alone.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use automation_core::duration::parse_duration_or;
use automation_core::types::{Environment, NodeConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::NodeClient;
use crate::engine::{ContainerEngine, ContainerSpec, ContainerSummary, Mount, PortBinding};
use crate::error::{cancellable, sleep_or_cancel, NodeError, NodeResult};
use crate::health::wait_healthy;
use crate::jobs::{
    bootstrap_job, bootstrapper_address, job_installed, participant_job, ParticipantJob,
    BOOTSTRAP_JOB_TYPE, PARTICIPANT_JOB_TYPE,
};
use crate::secrets::{
    write_node_files, MercuryCredentials, NodeFiles, API_FILE, CONFIG_FILE, MOUNT_POINT,
    PASSWORD_FILE, SECRETS_FILE,
};

pub const DB_IMAGE: &str = "postgres:latest";
pub const DB_PORT: u16 = 5432;
pub const DB_USER: &str = "postgres";
pub const DB_PASSWORD: &str = "verylongdatabasepassword";
/// API port inside the node container.
pub const NODE_API_PORT: u16 = 6688;

/// Name of the group network.
pub fn network_name(group: &str) -> String {
    format!("{group}-local")
}

pub fn container_name(group: &str, node: &str) -> String {
    format!("{group}-{node}")
}

pub fn db_container_name(group: &str, node: &str) -> String {
    format!("{group}-{node}-postgres")
}

/// Environment-wide settings for node containers.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub group_name: String,
    /// Host the published node ports are reached on.
    pub host: String,
    /// Host interface published ports bind to.
    pub bind_ip: String,
    pub db_image: String,
    pub chain_id: u64,
    pub ws_url: String,
    pub http_url: String,
    pub mercury: MercuryCredentials,
    pub health_interval: Duration,
    pub health_timeout: Duration,
    pub db_grace_period: Duration,
}

impl OrchestratorSettings {
    pub fn from_environment(env: &Environment) -> Self {
        Self {
            group_name: env.group_name.clone(),
            host: "localhost".to_string(),
            bind_ip: "0.0.0.0".to_string(),
            db_image: DB_IMAGE.to_string(),
            chain_id: env.chain_id,
            ws_url: env.ws_url.clone(),
            http_url: env.http_url.clone(),
            mercury: MercuryCredentials {
                legacy_url: env.mercury_legacy_url.clone(),
                url: env.mercury_url.clone(),
                id: env.mercury_id.clone(),
                key: env.mercury_key.clone(),
            },
            health_interval: parse_duration_or(&env.health_interval, Duration::from_secs(5)),
            health_timeout: parse_duration_or(&env.health_timeout, Duration::from_secs(120)),
            db_grace_period: parse_duration_or(&env.db_grace_period, Duration::from_secs(10)),
        }
    }

    pub fn node_url(&self, node: &NodeConfig) -> String {
        format!("http://{}:{}", self.host, node.port)
    }
}

/// One observed container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observed {
    pub id: Option<String>,
    pub image: Option<String>,
    pub running: bool,
}

impl Observed {
    pub fn created(&self) -> bool {
        self.id.is_some()
    }

    /// The image the container runs when it differs from `wanted`.
    pub fn stale_image(&self, wanted: &str) -> Option<&str> {
        self.image.as_deref().filter(|image| *image != wanted)
    }

    fn from_summary(summary: Option<&ContainerSummary>) -> Self {
        match summary {
            Some(c) => Self {
                id: Some(c.id.clone()),
                image: Some(c.image.clone()),
                running: c.running,
            },
            None => Self::default(),
        }
    }
}

/// Observed state of a node's container pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeState {
    pub db: Observed,
    pub main: Observed,
}

impl NodeState {
    /// `(db created, db running, main created, main running)`.
    pub fn vector(&self) -> (bool, bool, bool, bool) {
        (
            self.db.created(),
            self.db.running,
            self.main.created(),
            self.main.running,
        )
    }
}

/// What a node does in the network.
#[derive(Debug, Clone)]
pub enum NodeRole {
    Bootstrap,
    Participant {
        /// `<peer-id>@<host>:<port>` of the bootstrap node.
        bootstrapper: String,
        /// Hex private key imported as the transmitter. When absent the
        /// node's first existing key is adopted.
        private_key: Option<String>,
    },
}

/// Input of [`Orchestrator::bring_up`].
#[derive(Debug, Clone)]
pub struct BringUp {
    pub node: NodeConfig,
    pub role: NodeRole,
    pub registry: Address,
    /// State directory of this node; receives the `secrets/` folder.
    pub node_dir: PathBuf,
    /// Remove existing containers first.
    pub reset: bool,
}

pub struct Orchestrator {
    engine: Arc<dyn ContainerEngine>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn ContainerEngine>, settings: OrchestratorSettings) -> Self {
        Self { engine, settings }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// P2P address participants use to reach `bootstrap`.
    pub fn bootstrapper(&self, bootstrap: &NodeConfig) -> NodeResult<String> {
        let peer = bootstrap.p2p_key_id.as_deref().ok_or_else(|| {
            NodeError::Precondition(
                "bootstrap node has no P2P key; run `network bootstrap set` first".to_string(),
            )
        })?;
        Ok(bootstrapper_address(
            peer,
            &container_name(&self.settings.group_name, &bootstrap.name),
            bootstrap.p2p_port,
        ))
    }

    /// Observe the container pair of `node_name`.
    pub async fn inspect(
        &self,
        cancel: &CancellationToken,
        node_name: &str,
    ) -> NodeResult<NodeState> {
        let group = &self.settings.group_name;
        let main_name = container_name(group, node_name);
        let db_name = db_container_name(group, node_name);
        let found = cancellable(cancel, self.engine.list_containers(&main_name)).await?;

        // The prefix listing may include other nodes (`node-1` vs `node-10`).
        let state = NodeState {
            db: Observed::from_summary(found.iter().find(|c| c.name == db_name)),
            main: Observed::from_summary(found.iter().find(|c| c.name == main_name)),
        };
        debug!(node = node_name, state = ?state.vector(), "observed containers");
        Ok(state)
    }

    /// Force-remove both containers of `node_name`, main first.
    pub async fn remove(&self, cancel: &CancellationToken, node_name: &str) -> NodeResult<()> {
        let state = self.inspect(cancel, node_name).await?;
        for id in [state.main.id, state.db.id].into_iter().flatten() {
            cancellable(cancel, self.engine.remove_container(&id, true)).await?;
            info!(node = node_name, container = %id, "container removed");
        }
        Ok(())
    }

    /// Open an authenticated API session with `node`.
    pub async fn authenticate(
        &self,
        cancel: &CancellationToken,
        node: &NodeConfig,
    ) -> NodeResult<NodeClient> {
        let url = node
            .url
            .clone()
            .unwrap_or_else(|| self.settings.node_url(node));
        let client = NodeClient::new(&url, &node.login, &node.password)?;
        client.authenticate(cancel).await?;
        Ok(client)
    }

    /// Bring a node to running, configured state and return its record
    /// enriched with what the node reported.
    pub async fn bring_up(
        &self,
        cancel: &CancellationToken,
        request: BringUp,
    ) -> NodeResult<NodeConfig> {
        let BringUp {
            mut node,
            role,
            registry,
            node_dir,
            reset,
        } = request;
        let group = self.settings.group_name.clone();
        let network = network_name(&group);

        if !cancellable(cancel, self.engine.image_present(&self.settings.db_image)).await? {
            info!(image = %self.settings.db_image, "pulling database image");
            cancellable(cancel, self.engine.pull_image(&self.settings.db_image)).await?;
        }
        if !cancellable(cancel, self.engine.network_present(&network)).await? {
            info!(%network, "creating network");
            cancellable(cancel, self.engine.create_network(&network)).await?;
        }

        let mut state = self.inspect(cancel, &node.name).await?;
        if reset && state != NodeState::default() {
            info!(node = %node.name, "resetting node");
            self.remove(cancel, &node.name).await?;
            node.clear_discovered();
            state = NodeState::default();
        }

        self.ensure_database(cancel, &node, &state.db).await?;

        let secrets = write_node_files(
            &node_dir,
            &NodeFiles {
                login: &node.login,
                password: &node.password,
                log_level: &node.log_level,
                chain_id: self.settings.chain_id,
                ws_url: &self.settings.ws_url,
                http_url: &self.settings.http_url,
                mercury: &self.settings.mercury,
            },
        )?;

        self.ensure_main(cancel, &node, &state.main, secrets).await?;

        let probe_address = format!("{}:{}", self.settings.host, node.port);
        wait_healthy(
            cancel,
            &probe_address,
            self.settings.health_interval,
            self.settings.health_timeout,
        )
        .await?;

        node.url = Some(self.settings.node_url(&node));
        let client = self.authenticate(cancel, &node).await?;

        match role {
            NodeRole::Bootstrap => {
                node.p2p_key_id = Some(client.p2p_key_id(cancel).await?);
                let jobs = client.jobs(cancel).await?;
                if job_installed(&jobs, BOOTSTRAP_JOB_TYPE, registry) {
                    info!(node = %node.name, %registry, "bootstrap job already installed");
                } else {
                    let spec = bootstrap_job(registry, self.settings.chain_id)?;
                    let id = client.create_job(cancel, &spec).await?;
                    info!(node = %node.name, job = %id, "bootstrap job created");
                }
            }
            NodeRole::Participant {
                bootstrapper,
                private_key,
            } => {
                let transmitter = match private_key {
                    Some(key) => {
                        let keystore = automation_chain::keys::encrypt_keystore(&key, &node.password)
                            .map_err(|e| NodeError::Key(e.to_string()))?;
                        let keystore: serde_json::Value = serde_json::from_str(&keystore)
                            .map_err(|e| NodeError::Encoding(e.to_string()))?;
                        let address = client
                            .import_eth_key(cancel, &keystore, &node.password)
                            .await?;
                        info!(node = %node.name, %address, "transmitter key imported");
                        address
                    }
                    None => {
                        let keys = client.eth_keys(cancel).await?;
                        let address = keys.first().copied().ok_or_else(|| {
                            NodeError::Key(format!("node {} reports no EVM keys", node.name))
                        })?;
                        debug!(node = %node.name, %address, "adopted node key");
                        address
                    }
                };
                let bundle = client.ocr2_bundle(cancel).await?;
                node.p2p_key_id = Some(client.p2p_key_id(cancel).await?);
                node.address = Some(transmitter);

                let jobs = client.jobs(cancel).await?;
                if job_installed(&jobs, PARTICIPANT_JOB_TYPE, registry) {
                    info!(node = %node.name, %registry, "automation job already installed");
                } else {
                    let spec = participant_job(&ParticipantJob {
                        registry,
                        chain_id: self.settings.chain_id,
                        key_bundle_id: &bundle.bundle_id,
                        transmitter,
                        bootstrapper: &bootstrapper,
                    })?;
                    let id = client.create_job(cancel, &spec).await?;
                    info!(node = %node.name, job = %id, "automation job created");
                }
                node.ocr = Some(bundle);
            }
        }

        info!(node = %node.name, url = ?node.url, "node ready");
        Ok(node)
    }

    async fn ensure_database(
        &self,
        cancel: &CancellationToken,
        node: &NodeConfig,
        db: &Observed,
    ) -> NodeResult<()> {
        let name = db_container_name(&self.settings.group_name, &node.name);
        let id = match &db.id {
            Some(_) if db.running => {
                debug!(container = %name, "database already running");
                return Ok(());
            }
            Some(id) => id.clone(),
            None => {
                let spec = ContainerSpec {
                    name: name.clone(),
                    image: self.settings.db_image.clone(),
                    command: ["postgres", "-c", "max_connections=1000"]
                        .map(String::from)
                        .to_vec(),
                    env: vec![
                        ("POSTGRES_USER".to_string(), DB_USER.to_string()),
                        ("POSTGRES_PASSWORD".to_string(), DB_PASSWORD.to_string()),
                    ],
                    network: network_name(&self.settings.group_name),
                    aliases: vec![name.clone()],
                    ..Default::default()
                };
                let id = cancellable(cancel, self.engine.create_container(&spec)).await?;
                info!(container = %name, %id, "database container created");
                id
            }
        };
        cancellable(cancel, self.engine.start_container(&id)).await?;
        info!(container = %name, "database started; waiting for it to accept connections");
        sleep_or_cancel(cancel, self.settings.db_grace_period).await
    }

    async fn ensure_main(
        &self,
        cancel: &CancellationToken,
        node: &NodeConfig,
        main: &Observed,
        secrets: PathBuf,
    ) -> NodeResult<()> {
        let name = container_name(&self.settings.group_name, &node.name);
        if let Some(running) = main.stale_image(&node.image) {
            warn!(
                container = %name,
                running,
                configured = %node.image,
                "container runs a different image; reset to recreate it"
            );
        }
        let id = match &main.id {
            Some(_) if main.running => {
                debug!(container = %name, "node already running");
                return Ok(());
            }
            Some(id) => {
                warn!(container = %name, "node container stopped; restarting");
                id.clone()
            }
            None => {
                let spec = self.main_spec(node, &name, secrets);
                let id = cancellable(cancel, self.engine.create_container(&spec)).await?;
                info!(container = %name, %id, "node container created");
                id
            }
        };
        cancellable(cancel, self.engine.start_container(&id)).await?;
        info!(container = %name, port = node.port, "node started");
        Ok(())
    }

    fn main_spec(&self, node: &NodeConfig, name: &str, secrets: PathBuf) -> ContainerSpec {
        let group = &self.settings.group_name;
        let secret = |file: &str| format!("{MOUNT_POINT}/{file}");
        let database_url = format!(
            "postgresql://{DB_USER}:{DB_PASSWORD}@{}:{DB_PORT}/postgres?sslmode=disable",
            db_container_name(group, &node.name)
        );
        let p2p = format!(
            "[P2P.V2]\nListenAddresses = [\"0.0.0.0:{}\"]\n",
            node.p2p_port
        );
        ContainerSpec {
            name: name.to_string(),
            image: node.image.clone(),
            command: vec![
                "node".to_string(),
                "-config".to_string(),
                secret(CONFIG_FILE),
                "-secrets".to_string(),
                secret(SECRETS_FILE),
                "start".to_string(),
                "-d".to_string(),
                "-p".to_string(),
                secret(PASSWORD_FILE),
                "-a".to_string(),
                secret(API_FILE),
            ],
            env: vec![
                ("CL_CONFIG".to_string(), p2p),
                ("CL_DATABASE_URL".to_string(), database_url),
                ("CL_PASSWORD_KEYSTORE".to_string(), node.password.clone()),
            ],
            network: network_name(group),
            aliases: vec![name.to_string()],
            ports: vec![PortBinding {
                container_port: NODE_API_PORT,
                host_ip: self.settings.bind_ip.clone(),
                host_port: node.port,
            }],
            mounts: vec![Mount {
                source: secrets,
                target: MOUNT_POINT.to_string(),
                read_only: true,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeEngine;

    fn settings() -> OrchestratorSettings {
        let mut env = Environment::default();
        env.group_name = "automation".to_string();
        env.chain_id = 1337;
        OrchestratorSettings::from_environment(&env)
    }

    fn orchestrator(engine: &FakeEngine) -> Orchestrator {
        Orchestrator::new(Arc::new(engine.clone()), settings())
    }

    #[test]
    fn names_follow_group() {
        assert_eq!(network_name("automation"), "automation-local");
        assert_eq!(container_name("automation", "node-1"), "automation-node-1");
        assert_eq!(
            db_container_name("automation", "node-1"),
            "automation-node-1-postgres"
        );
    }

    #[test]
    fn settings_fall_back_on_malformed_durations() {
        let mut env = Environment::default();
        env.health_timeout = "soon".to_string();
        env.health_interval = "2s".to_string();
        let settings = OrchestratorSettings::from_environment(&env);
        assert_eq!(settings.health_timeout, Duration::from_secs(120));
        assert_eq!(settings.health_interval, Duration::from_secs(2));
    }

    #[test]
    fn main_spec_wires_database_and_secrets() {
        let engine = FakeEngine::new();
        let orch = orchestrator(&engine);
        let node = NodeConfig::new("node-1", "smartcontract/chainlink:2.6.0", "info", 6689);
        let spec = orch.main_spec(&node, "automation-node-1", PathBuf::from("/state/secrets"));

        assert_eq!(spec.network, "automation-local");
        assert_eq!(spec.aliases, vec!["automation-node-1".to_string()]);
        assert_eq!(
            spec.ports,
            vec![PortBinding {
                container_port: 6688,
                host_ip: "0.0.0.0".to_string(),
                host_port: 6689,
            }]
        );
        assert!(spec.mounts[0].read_only);
        assert_eq!(spec.mounts[0].target, "/run/secrets");

        let env = |key: &str| {
            spec.env
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert!(env("CL_DATABASE_URL").contains("@automation-node-1-postgres:5432/"));
        assert!(env("CL_CONFIG").contains("0.0.0.0:8000"));
        assert_eq!(env("CL_PASSWORD_KEYSTORE"), node.password);
        assert!(spec.command.contains(&"/run/secrets/01-config.toml".to_string()));
    }

    #[tokio::test]
    async fn inspect_matches_exact_names() {
        let engine = FakeEngine::new();
        let orch = orchestrator(&engine);
        engine.create_network("automation-local").await.unwrap();
        let other = ContainerSpec {
            name: "automation-node-10".to_string(),
            network: "automation-local".to_string(),
            ..Default::default()
        };
        let id = engine.create_container(&other).await.unwrap();
        engine.start_container(&id).await.unwrap();

        let cancel = CancellationToken::new();
        let state = orch.inspect(&cancel, "node-1").await.unwrap();
        assert_eq!(state.vector(), (false, false, false, false));

        let db = ContainerSpec {
            name: "automation-node-1-postgres".to_string(),
            network: "automation-local".to_string(),
            ..Default::default()
        };
        engine.create_container(&db).await.unwrap();
        let state = orch.inspect(&cancel, "node-1").await.unwrap();
        assert_eq!(state.vector(), (true, false, false, false));
    }

    #[test]
    fn bootstrapper_requires_peer_id() {
        let engine = FakeEngine::new();
        let orch = orchestrator(&engine);
        let mut bootstrap = NodeConfig::bootstrap("image", "info");
        assert!(matches!(
            orch.bootstrapper(&bootstrap),
            Err(NodeError::Precondition(_))
        ));
        bootstrap.p2p_key_id = Some("12D3KooWpeer".to_string());
        assert_eq!(
            orch.bootstrapper(&bootstrap).unwrap(),
            "12D3KooWpeer@automation-bootstrap:8000"
        );
    }
}
