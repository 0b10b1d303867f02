//! Domain types for the environment record.
//!
//! One [`Environment`] is persisted per environment name as
//! `<state-directory>/<name>/config.toml`. Header keys are kebab-case;
//! contract and node sections are PascalCase tables (`[LinkToken]`,
//! `[Registry]`, `[[Participants]]`).

use std::fmt;
use std::str::FromStr;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};

/// Listen port of the bootstrap node.
pub const BOOTSTRAP_PORT: u16 = 5688;
/// Listen port of participant 0; participant `i` listens on `6688 + i`.
pub const PARTICIPANT_BASE_PORT: u16 = 6688;
/// P2P port every node listens on inside its container.
pub const P2P_PORT: u16 = 8000;
/// Name of the singular bootstrap node.
pub const BOOTSTRAP_NAME: &str = "bootstrap";

pub const DEFAULT_GROUP_NAME: &str = "automation";
pub const DEFAULT_KEY_ALIAS: &str = "default";
pub const DEFAULT_GAS_LIMIT: u64 = 6_500_000;
pub const DEFAULT_GAS_PREMIUM_PERCENT: u64 = 20;
pub const DEFAULT_NODE_LOGIN: &str = "notreal@fakeemail.ch";
pub const DEFAULT_NODE_PASSWORD: &str = "fj293fbBnlQ!f9vNs";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Name of participant `index`.
pub fn participant_name(index: usize) -> String {
    format!("participant-{index}")
}

/// Listen port of participant `index`.
pub fn participant_port(index: usize) -> StateResult<u16> {
    u16::try_from(index)
        .ok()
        .and_then(|i| PARTICIPANT_BASE_PORT.checked_add(i))
        .ok_or_else(|| {
            StateError::Invariant(format!("participant {index} has no listen port left"))
        })
}

// ── Environment ───────────────────────────────────────────────────

/// Everything one named environment knows about its chain, contracts and nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Environment {
    #[serde(default = "default_group_name")]
    pub group_name: String,
    #[serde(default)]
    pub chain_id: u64,
    #[serde(default)]
    pub ws_url: String,
    #[serde(default)]
    pub http_url: String,
    /// Alias in the key vault used to sign transactions.
    #[serde(default = "default_key_alias")]
    pub private_key_alias: String,
    #[serde(default = "default_gas_limit")]
    pub deployer_gas_limit: u64,
    /// Added on top of the node-suggested gas price.
    #[serde(default = "default_gas_premium")]
    pub gas_price_premium_percent: u64,
    /// Ceiling for the node health probe (e.g. "120s").
    #[serde(default = "default_health_timeout")]
    pub health_timeout: String,
    #[serde(default = "default_health_interval")]
    pub health_interval: String,
    /// Wait after the first start of a database container.
    #[serde(default = "default_db_grace_period")]
    pub db_grace_period: String,
    /// Directory holding compiled contract artifacts. Defaults to
    /// `<state-directory>/artifacts`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts_directory: Option<String>,
    #[serde(default)]
    pub mercury_legacy_url: String,
    #[serde(default)]
    pub mercury_url: String,
    #[serde(default)]
    pub mercury_id: String,
    #[serde(default)]
    pub mercury_key: String,

    #[serde(rename = "LinkToken", default, skip_serializing_if = "Option::is_none")]
    pub link_token: Option<LinkTokenConfig>,
    #[serde(rename = "LinkETHFeed", default, skip_serializing_if = "Option::is_none")]
    pub link_eth_feed: Option<FeedConfig>,
    #[serde(rename = "FastGasFeed", default, skip_serializing_if = "Option::is_none")]
    pub fast_gas_feed: Option<FeedConfig>,
    #[serde(rename = "Registry", default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryConfig>,
    #[serde(rename = "Registrar", default, skip_serializing_if = "Option::is_none")]
    pub registrar: Option<RegistrarConfig>,
    #[serde(rename = "VerifiableLoad", default, skip_serializing_if = "Option::is_none")]
    pub verifiable_load: Option<VerifiableLoadConfig>,
    #[serde(
        rename = "VerifiableLoadLogTrigger",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub verifiable_load_log_trigger: Option<VerifiableLoadConfig>,

    #[serde(rename = "Bootstrap", default, skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<NodeConfig>,
    #[serde(rename = "Participants", default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<NodeConfig>,
}

fn default_group_name() -> String {
    DEFAULT_GROUP_NAME.to_string()
}
fn default_key_alias() -> String {
    DEFAULT_KEY_ALIAS.to_string()
}
fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}
fn default_gas_premium() -> u64 {
    DEFAULT_GAS_PREMIUM_PERCENT
}
fn default_health_timeout() -> String {
    "120s".to_string()
}
fn default_health_interval() -> String {
    "5s".to_string()
}
fn default_db_grace_period() -> String {
    "10s".to_string()
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            group_name: default_group_name(),
            chain_id: 0,
            ws_url: String::new(),
            http_url: String::new(),
            private_key_alias: default_key_alias(),
            deployer_gas_limit: DEFAULT_GAS_LIMIT,
            gas_price_premium_percent: DEFAULT_GAS_PREMIUM_PERCENT,
            health_timeout: default_health_timeout(),
            health_interval: default_health_interval(),
            db_grace_period: default_db_grace_period(),
            artifacts_directory: None,
            mercury_legacy_url: String::new(),
            mercury_url: String::new(),
            mercury_id: String::new(),
            mercury_key: String::new(),
            link_token: None,
            link_eth_feed: None,
            fast_gas_feed: None,
            registry: None,
            registrar: None,
            verifiable_load: None,
            verifiable_load_log_trigger: None,
            bootstrap: None,
            participants: Vec::new(),
        }
    }
}

impl Environment {
    /// Parse an environment from TOML text.
    pub fn from_toml_str(content: &str) -> StateResult<Self> {
        toml::from_str(content).map_err(|e| StateError::Invariant(e.to_string()))
    }

    /// Render the environment as TOML text.
    pub fn to_toml_string(&self) -> StateResult<String> {
        toml::to_string_pretty(self).map_err(|e| StateError::Invariant(e.to_string()))
    }

    /// Index the next added participant receives.
    pub fn next_participant_index(&self) -> usize {
        self.participants.len()
    }

    /// Append a participant with the identity implied by its position.
    pub fn push_participant(
        &mut self,
        image: &str,
        log_level: &str,
    ) -> StateResult<&mut NodeConfig> {
        let index = self.next_participant_index();
        let node = NodeConfig::new(
            &participant_name(index),
            image,
            log_level,
            participant_port(index)?,
        );
        self.participants.push(node);
        let last = self.participants.len() - 1;
        Ok(&mut self.participants[last])
    }

    /// Look up a participant by name or by bare index ("3" or "participant-3").
    pub fn participant(&self, name_or_index: &str) -> Option<(usize, &NodeConfig)> {
        let index = name_or_index
            .strip_prefix("participant-")
            .unwrap_or(name_or_index)
            .parse::<usize>()
            .ok()?;
        self.participants.get(index).map(|node| (index, node))
    }

    /// Look up any node (bootstrap or participant) by name or participant index.
    pub fn node(&self, name_or_index: &str) -> Option<&NodeConfig> {
        if name_or_index == BOOTSTRAP_NAME {
            return self.bootstrap.as_ref();
        }
        self.participant(name_or_index).map(|(_, node)| node)
    }

    /// Bind a registrar and keep the registry's registrar list in sync.
    pub fn set_registrar(&mut self, registrar: RegistrarConfig) {
        if let Some(registry) = self.registry.as_mut() {
            registry.onchain.registrars = vec![registrar.address];
        }
        self.registrar = Some(registrar);
    }

    /// Bind a registry, carrying the current registrar into its on-chain config.
    pub fn set_registry(&mut self, mut registry: RegistryConfig) {
        registry.onchain.registrars = self
            .registrar
            .as_ref()
            .map(|r| vec![r.address])
            .unwrap_or_default();
        self.registry = Some(registry);
    }

    /// Check the structural invariants every persisted environment holds.
    pub fn validate(&self) -> StateResult<()> {
        for (index, node) in self.participants.iter().enumerate() {
            if node.name != participant_name(index) {
                return Err(StateError::Invariant(format!(
                    "participant at position {index} is named {}",
                    node.name
                )));
            }
            let expected = participant_port(index)?;
            if node.port != expected {
                return Err(StateError::Invariant(format!(
                    "{} listens on {}, expected {expected}",
                    node.name, node.port
                )));
            }
        }

        if !self.participants.is_empty() && self.bootstrap.is_none() {
            return Err(StateError::Invariant(
                "participants exist without a bootstrap node".to_string(),
            ));
        }

        if let Some(bootstrap) = &self.bootstrap {
            if bootstrap.port != BOOTSTRAP_PORT {
                return Err(StateError::Invariant(format!(
                    "bootstrap listens on {}, expected {BOOTSTRAP_PORT}",
                    bootstrap.port
                )));
            }
        }

        if let Some(registry) = &self.registry {
            let expected: Vec<Address> = self.registrar.iter().map(|r| r.address).collect();
            if registry.onchain.registrars != expected {
                return Err(StateError::Invariant(
                    "registry registrars do not match the bound registrar".to_string(),
                ));
            }
        }

        Ok(())
    }
}

// ── Contracts ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct LinkTokenConfig {
    pub address: Address,
}

/// A mock aggregator feeding a fixed answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct FeedConfig {
    pub address: Address,
    #[serde(default)]
    pub decimals: u8,
    /// Initial answer as a decimal string (may exceed 64 bits).
    #[serde(default)]
    pub answer: String,
}

/// Which chain-specific flavour of the registry logic to deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegistryMode {
    #[default]
    Default,
    Arbitrum,
    Optimism,
}

impl RegistryMode {
    /// Numeric value of the on-chain `Mode` enum.
    pub fn as_u8(self) -> u8 {
        match self {
            RegistryMode::Default => 0,
            RegistryMode::Arbitrum => 1,
            RegistryMode::Optimism => 2,
        }
    }
}

impl fmt::Display for RegistryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegistryMode::Default => "DEFAULT",
            RegistryMode::Arbitrum => "ARBITRUM",
            RegistryMode::Optimism => "OPTIMISM",
        };
        f.write_str(s)
    }
}

impl FromStr for RegistryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEFAULT" => Ok(RegistryMode::Default),
            "ARBITRUM" => Ok(RegistryMode::Arbitrum),
            "OPTIMISM" => Ok(RegistryMode::Optimism),
            other => Err(format!("unknown registry mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RegistryConfig {
    pub address: Address,
    #[serde(default)]
    pub mode: RegistryMode,
    #[serde(default)]
    pub onchain: OnchainConfig,
    #[serde(default)]
    pub offchain: OffchainConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
}

impl RegistryConfig {
    pub fn new(address: Address, mode: RegistryMode) -> Self {
        Self {
            address,
            mode,
            onchain: OnchainConfig::default(),
            offchain: OffchainConfig::default(),
            ocr: OcrConfig::default(),
        }
    }
}

/// Parameters stored by the registry contract itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct OnchainConfig {
    pub payment_premium_ppb: u32,
    pub flat_fee_micro_link: u32,
    pub check_gas_limit: u32,
    pub staleness_seconds: u32,
    pub gas_ceiling_multiplier: u16,
    pub min_upkeep_spend: u64,
    pub max_perform_gas: u32,
    pub max_check_data_size: u32,
    pub max_perform_data_size: u32,
    pub max_revert_data_size: u32,
    pub fallback_gas_price: u64,
    pub fallback_link_price: u64,
    pub transcoder: Address,
    pub registrars: Vec<Address>,
    pub upkeep_privilege_manager: Address,
}

impl Default for OnchainConfig {
    fn default() -> Self {
        Self {
            payment_premium_ppb: 200_000_000,
            flat_fee_micro_link: 0,
            check_gas_limit: 10_000_000,
            staleness_seconds: 90_000,
            gas_ceiling_multiplier: 1,
            min_upkeep_spend: 0,
            max_perform_gas: 5_000_000,
            max_check_data_size: 5_000,
            max_perform_data_size: 5_000,
            max_revert_data_size: 5_000,
            fallback_gas_price: 200_000_000_000,
            fallback_link_price: 20_000_000_000_000_000,
            transcoder: Address::ZERO,
            registrars: Vec::new(),
            upkeep_privilege_manager: Address::ZERO,
        }
    }
}

/// Plugin parameters interpreted by the nodes, not by the contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct OffchainConfig {
    pub target_probability: String,
    pub target_in_rounds: u32,
    pub perform_lockout_window: u64,
    pub gas_limit_per_report: u32,
    pub gas_overhead_per_upkeep: u32,
    pub min_confirmations: u32,
    pub max_upkeep_batch_size: u32,
}

impl Default for OffchainConfig {
    fn default() -> Self {
        Self {
            target_probability: "0.999".to_string(),
            target_in_rounds: 1,
            perform_lockout_window: 100_000,
            gas_limit_per_report: 10_300_000,
            gas_overhead_per_upkeep: 300_000,
            min_confirmations: 0,
            max_upkeep_batch_size: 10,
        }
    }
}

/// OCR protocol timing and fault tolerance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct OcrConfig {
    pub delta_progress: String,
    pub delta_resend: String,
    pub delta_initial: String,
    pub delta_round: String,
    pub delta_grace: String,
    pub delta_certified_commit_request: String,
    pub delta_stage: String,
    pub max_rounds: u64,
    /// Transmission schedule; empty means one transmitter per stage per participant.
    pub schedule: Vec<u32>,
    pub max_duration_query: String,
    pub max_duration_observation: String,
    pub max_duration_should_accept: String,
    pub max_duration_should_transmit: String,
    pub max_faulty_nodes: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            delta_progress: "10s".to_string(),
            delta_resend: "15s".to_string(),
            delta_initial: "500ms".to_string(),
            delta_round: "1000ms".to_string(),
            delta_grace: "200ms".to_string(),
            delta_certified_commit_request: "300ms".to_string(),
            delta_stage: "25s".to_string(),
            max_rounds: 24,
            schedule: Vec::new(),
            max_duration_query: "20ms".to_string(),
            max_duration_observation: "20ms".to_string(),
            max_duration_should_accept: "1200ms".to_string(),
            max_duration_should_transmit: "20ms".to_string(),
            max_faulty_nodes: 1,
        }
    }
}

/// Auto-approval policy of the registrar for one trigger type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoApproveType {
    Disabled,
    Whitelist,
    #[default]
    All,
}

impl AutoApproveType {
    pub fn as_u8(self) -> u8 {
        match self {
            AutoApproveType::Disabled => 0,
            AutoApproveType::Whitelist => 1,
            AutoApproveType::All => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct AutoApproveRule {
    pub auto_approve: AutoApproveType,
    pub max_allowed: u32,
}

impl Default for AutoApproveRule {
    fn default() -> Self {
        Self {
            auto_approve: AutoApproveType::All,
            max_allowed: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RegistrarConfig {
    pub address: Address,
    #[serde(default)]
    pub min_link_juels: u64,
    #[serde(default)]
    pub conditional: AutoApproveRule,
    #[serde(default)]
    pub log_trigger: AutoApproveRule,
}

impl RegistrarConfig {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            min_link_juels: 0,
            conditional: AutoApproveRule::default(),
            log_trigger: AutoApproveRule::default(),
        }
    }
}

/// Which of the two load-testing contracts a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifiableLoadType {
    Conditional,
    LogTrigger,
}

impl FromStr for VerifiableLoadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conditional" => Ok(VerifiableLoadType::Conditional),
            "log-trigger" => Ok(VerifiableLoadType::LogTrigger),
            other => Err(format!("unknown verifiable load type: {other}")),
        }
    }
}

impl fmt::Display for VerifiableLoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifiableLoadType::Conditional => f.write_str("conditional"),
            VerifiableLoadType::LogTrigger => f.write_str("log-trigger"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct VerifiableLoadConfig {
    pub address: Address,
    #[serde(default)]
    pub use_arbitrum: bool,
    #[serde(default)]
    pub use_mercury: bool,
}

impl Environment {
    pub fn verifiable_load(&self, kind: VerifiableLoadType) -> Option<&VerifiableLoadConfig> {
        match kind {
            VerifiableLoadType::Conditional => self.verifiable_load.as_ref(),
            VerifiableLoadType::LogTrigger => self.verifiable_load_log_trigger.as_ref(),
        }
    }

    pub fn set_verifiable_load(&mut self, kind: VerifiableLoadType, config: VerifiableLoadConfig) {
        match kind {
            VerifiableLoadType::Conditional => self.verifiable_load = Some(config),
            VerifiableLoadType::LogTrigger => self.verifiable_load_log_trigger = Some(config),
        }
    }
}

// ── Nodes ─────────────────────────────────────────────────────────

/// How a node process is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostType {
    #[default]
    Docker,
}

/// OCR2 key bundle public halves reported by a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub struct OcrKeyBundle {
    pub bundle_id: String,
    /// 20-byte signer address derived from the on-chain signing key.
    pub onchain_public_key: String,
    pub offchain_public_key: String,
    pub config_public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct NodeConfig {
    pub name: String,
    #[serde(default)]
    pub host_type: HostType,
    pub image: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub port: u16,
    #[serde(default = "default_p2p_port")]
    pub p2p_port: u16,
    #[serde(default = "default_login")]
    pub login: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p2p_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr: Option<OcrKeyBundle>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_p2p_port() -> u16 {
    P2P_PORT
}
fn default_login() -> String {
    DEFAULT_NODE_LOGIN.to_string()
}
fn default_password() -> String {
    DEFAULT_NODE_PASSWORD.to_string()
}

impl NodeConfig {
    pub fn new(name: &str, image: &str, log_level: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            host_type: HostType::Docker,
            image: image.to_string(),
            log_level: log_level.to_string(),
            port,
            p2p_port: P2P_PORT,
            login: default_login(),
            password: default_password(),
            private_key_alias: None,
            address: None,
            url: None,
            p2p_key_id: None,
            ocr: None,
        }
    }

    /// A fresh bootstrap node record.
    pub fn bootstrap(image: &str, log_level: &str) -> Self {
        Self::new(BOOTSTRAP_NAME, image, log_level, BOOTSTRAP_PORT)
    }

    /// Drop everything learned from a running node, keeping its identity.
    pub fn clear_discovered(&mut self) {
        self.address = None;
        self.url = None;
        self.p2p_key_id = None;
        self.ocr = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn default_environment_is_valid() {
        let env = Environment::default();
        assert_eq!(env.group_name, "automation");
        assert_eq!(env.private_key_alias, "default");
        assert_eq!(env.gas_price_premium_percent, 20);
        env.validate().unwrap();
    }

    #[test]
    fn participants_get_position_derived_identity() {
        let mut env = Environment::default();
        env.bootstrap = Some(NodeConfig::bootstrap("img", "info"));
        for _ in 0..3 {
            env.push_participant("img", "debug").unwrap();
        }
        let ports: Vec<u16> = env.participants.iter().map(|p| p.port).collect();
        assert_eq!(ports, vec![6688, 6689, 6690]);
        assert_eq!(env.participants[2].name, "participant-2");
        env.validate().unwrap();
    }

    #[test]
    fn participant_ports_stop_at_u16_max() {
        let last = usize::from(u16::MAX - PARTICIPANT_BASE_PORT);
        assert_eq!(participant_port(last).unwrap(), u16::MAX);
        assert!(matches!(participant_port(last + 1), Err(StateError::Invariant(_))));
        assert!(participant_port(usize::MAX).is_err());
    }

    #[test]
    fn validate_rejects_participants_without_bootstrap() {
        let mut env = Environment::default();
        env.push_participant("img", "info").unwrap();
        assert!(matches!(env.validate(), Err(StateError::Invariant(_))));
    }

    #[test]
    fn validate_rejects_misnumbered_port() {
        let mut env = Environment::default();
        env.bootstrap = Some(NodeConfig::bootstrap("img", "info"));
        env.push_participant("img", "info").unwrap().port = 7000;
        assert!(env.validate().is_err());
    }

    #[test]
    fn registrar_binding_updates_registry() {
        let mut env = Environment::default();
        env.set_registry(RegistryConfig::new(addr(1), RegistryMode::Default));
        assert!(env.registry.as_ref().unwrap().onchain.registrars.is_empty());

        env.set_registrar(RegistrarConfig::new(addr(2)));
        assert_eq!(
            env.registry.as_ref().unwrap().onchain.registrars,
            vec![addr(2)]
        );
        env.validate().unwrap();
    }

    #[test]
    fn rebinding_registry_keeps_registrar() {
        let mut env = Environment::default();
        env.set_registrar(RegistrarConfig::new(addr(2)));
        env.set_registry(RegistryConfig::new(addr(3), RegistryMode::Arbitrum));
        assert_eq!(
            env.registry.as_ref().unwrap().onchain.registrars,
            vec![addr(2)]
        );
    }

    #[test]
    fn validate_rejects_stale_registrars() {
        let mut env = Environment::default();
        let mut registry = RegistryConfig::new(addr(1), RegistryMode::Default);
        registry.onchain.registrars = vec![addr(9)];
        env.registry = Some(registry);
        assert!(env.validate().is_err());
    }

    #[test]
    fn participant_lookup_by_name_or_index() {
        let mut env = Environment::default();
        env.bootstrap = Some(NodeConfig::bootstrap("img", "info"));
        env.push_participant("img", "info").unwrap();
        env.push_participant("img", "info").unwrap();

        assert_eq!(env.participant("1").unwrap().1.name, "participant-1");
        assert_eq!(env.participant("participant-0").unwrap().0, 0);
        assert!(env.participant("participant-5").is_none());
        assert_eq!(env.node("bootstrap").unwrap().port, BOOTSTRAP_PORT);
    }

    #[test]
    fn registry_mode_parses_case_insensitively() {
        assert_eq!("arbitrum".parse::<RegistryMode>().unwrap(), RegistryMode::Arbitrum);
        assert_eq!("OPTIMISM".parse::<RegistryMode>().unwrap(), RegistryMode::Optimism);
        assert!("zksync".parse::<RegistryMode>().is_err());
    }

    #[test]
    fn toml_layout_uses_expected_sections() {
        let mut env = Environment {
            chain_id: 31337,
            http_url: "http://127.0.0.1:8545".to_string(),
            ..Environment::default()
        };
        env.link_token = Some(LinkTokenConfig { address: addr(0xaa) });
        env.bootstrap = Some(NodeConfig::bootstrap("img", "info"));
        env.push_participant("img", "info").unwrap();

        let text = env.to_toml_string().unwrap();
        assert!(text.contains("chain-id = 31337"));
        assert!(text.contains("[LinkToken]"));
        assert!(text.contains("[[Participants]]"));
        assert!(!text.contains("[Registry]"));
    }
}
