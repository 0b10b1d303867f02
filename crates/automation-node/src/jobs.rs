//! Job specs installed into nodes at bring-up.

use alloy_primitives::Address;
use serde::Serialize;

use crate::client::JobSummary;
use crate::error::{NodeError, NodeResult};

pub const BOOTSTRAP_JOB_TYPE: &str = "bootstrap";
pub const PARTICIPANT_JOB_TYPE: &str = "offchainreporting2";
/// Registry version the automation plugin reads.
pub const CONTRACT_VERSION: &str = "v2.1";
/// Name under which Mercury credentials are configured in `01-secret.toml`.
pub const MERCURY_CREDENTIAL_NAME: &str = "cred1";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BootstrapSpec {
    #[serde(rename = "type")]
    job_type: &'static str,
    schema_version: u32,
    name: &'static str,
    #[serde(rename = "contractID")]
    contract_id: String,
    relay: &'static str,
    relay_config: RelayConfig,
}

#[derive(Serialize)]
struct RelayConfig {
    #[serde(rename = "chainID")]
    chain_id: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantSpec<'a> {
    #[serde(rename = "type")]
    job_type: &'static str,
    plugin_type: &'static str,
    relay: &'static str,
    name: &'static str,
    forwarding_allowed: bool,
    schema_version: u32,
    #[serde(rename = "contractID")]
    contract_id: String,
    contract_config_tracker_poll_interval: &'static str,
    #[serde(rename = "ocrKeyBundleID")]
    ocr_key_bundle_id: &'a str,
    #[serde(rename = "transmitterID")]
    transmitter_id: String,
    p2pv2_bootstrappers: [&'a str; 1],
    relay_config: RelayConfig,
    plugin_config: PluginConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PluginConfig {
    max_service_workers: u32,
    cache_eviction_interval: &'static str,
    contract_version: &'static str,
    mercury_credential_name: &'static str,
}

fn encode<T: Serialize>(spec: &T) -> NodeResult<String> {
    toml::to_string(spec).map_err(|e| NodeError::Encoding(e.to_string()))
}

/// Bootstrap job for `registry` on `chain_id`.
pub fn bootstrap_job(registry: Address, chain_id: u64) -> NodeResult<String> {
    encode(&BootstrapSpec {
        job_type: BOOTSTRAP_JOB_TYPE,
        schema_version: 1,
        name: "automation-bootstrap",
        contract_id: registry.to_string(),
        relay: "evm",
        relay_config: RelayConfig { chain_id },
    })
}

/// Inputs of the participant job template.
#[derive(Debug, Clone)]
pub struct ParticipantJob<'a> {
    pub registry: Address,
    pub chain_id: u64,
    pub key_bundle_id: &'a str,
    pub transmitter: Address,
    /// `<peer-id>@<host>:<port>` of the bootstrap node.
    pub bootstrapper: &'a str,
}

pub fn participant_job(job: &ParticipantJob<'_>) -> NodeResult<String> {
    encode(&ParticipantSpec {
        job_type: PARTICIPANT_JOB_TYPE,
        plugin_type: "ocr2automation",
        relay: "evm",
        name: "ocr2-automation",
        forwarding_allowed: false,
        schema_version: 1,
        contract_id: job.registry.to_string(),
        contract_config_tracker_poll_interval: "15s",
        ocr_key_bundle_id: job.key_bundle_id,
        transmitter_id: job.transmitter.to_string(),
        p2pv2_bootstrappers: [job.bootstrapper],
        relay_config: RelayConfig {
            chain_id: job.chain_id,
        },
        plugin_config: PluginConfig {
            max_service_workers: 100,
            cache_eviction_interval: "1s",
            contract_version: CONTRACT_VERSION,
            mercury_credential_name: MERCURY_CREDENTIAL_NAME,
        },
    })
}

/// `<peer-id>@<host>:<port>`.
pub fn bootstrapper_address(peer_id: &str, host: &str, port: u16) -> String {
    format!("{peer_id}@{host}:{port}")
}

/// Whether `jobs` already holds a job of `job_type` for `contract`.
pub fn job_installed(jobs: &[JobSummary], job_type: &str, contract: Address) -> bool {
    jobs.iter().any(|job| {
        job.job_type == job_type
            && job
                .contract_id
                .as_deref()
                .and_then(|id| id.parse::<Address>().ok())
                == Some(contract)
    })
}
