//! The automation registry (v2.1).
//!
//! The registry is split across four contracts that must be created in
//! dependency order:
//!
//! ```text
//! ForwarderLogic ─┐
//! LINK, feeds ────┴─> LogicB ──> LogicA ──> Registry
//! ```
//!
//! Each step builds fresh transaction options. If any step fails the
//! addresses created so far are dropped.
//!
//! The offchain config written by [`set_offchain_config`] is a JSON
//! document, not the protobuf-framed blob produced by the OCR2 reporting
//! plugin tooling. Nodes running the stock plugin will not decode it.

use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256, aliases::{U24, U96}};
use alloy_sol_types::{SolType, SolValue, sol_data};
use automation_chain::TxReceipt;
use automation_core::duration::parse_duration;
use automation_core::{OcrConfig, OcrKeyBundle, OffchainConfig, OnchainConfig, RegistryMode};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::abi::{IKeeperRegistry, OnchainConfigV21};
use crate::catalog::Catalog;
use crate::error::{ContractError, ContractResult};

pub const FORWARDER_LOGIC_ARTIFACT: &str = "AutomationForwarderLogic";
pub const LOGIC_B_ARTIFACT: &str = "KeeperRegistryLogicB2_1";
pub const LOGIC_A_ARTIFACT: &str = "KeeperRegistryLogicA2_1";
pub const REGISTRY_ARTIFACT: &str = "KeeperRegistry2_1";

/// Version tag of the offchain config blob.
pub const OFFCHAIN_CONFIG_VERSION: u64 = 3;

/// Addresses and mode the registry logic is constructed with.
#[derive(Debug, Clone)]
pub struct RegistryDeploy {
    pub mode: RegistryMode,
    pub link: Address,
    pub link_eth_feed: Address,
    pub fast_gas_feed: Address,
}

pub(crate) async fn deploy(
    cancel: &CancellationToken,
    catalog: &Catalog,
    cfg: &RegistryDeploy,
) -> ContractResult<Address> {
    let forwarder = catalog
        .create(cancel, FORWARDER_LOGIC_ARTIFACT, Vec::new())
        .await?;

    let logic_b_args = <(
        sol_data::Uint<8>,
        sol_data::Address,
        sol_data::Address,
        sol_data::Address,
        sol_data::Address,
    ) as SolType>::abi_encode_params(&(
        cfg.mode.as_u8(),
        cfg.link,
        cfg.link_eth_feed,
        cfg.fast_gas_feed,
        forwarder,
    ));
    let logic_b = catalog.create(cancel, LOGIC_B_ARTIFACT, logic_b_args).await?;

    let logic_a = catalog
        .create(cancel, LOGIC_A_ARTIFACT, (logic_b,).abi_encode_params())
        .await?;

    let registry = catalog
        .create(cancel, REGISTRY_ARTIFACT, (logic_a,).abi_encode_params())
        .await?;
    info!(%registry, mode = %cfg.mode, %forwarder, %logic_a, %logic_b, "registry deployed");
    Ok(registry)
}

/// One oracle as the registry's configuration sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleIdentity {
    /// Address derived from the node's OCR on-chain signing key.
    pub signer: Address,
    /// The node's EVM account that submits reports.
    pub transmitter: Address,
    pub offchain_public_key: String,
    pub config_public_key: String,
    pub peer_id: String,
}

impl OracleIdentity {
    /// Combine a node's OCR bundle, P2P peer id and transmitter account.
    ///
    /// Node-side prefixes (`ocr2on_evm_`, `ocr2off_evm_`, `ocr2cfg_evm_`,
    /// `p2p_`) are stripped.
    pub fn from_bundle(
        bundle: &OcrKeyBundle,
        peer_id: &str,
        transmitter: Address,
    ) -> ContractResult<Self> {
        let onchain = strip_key_prefix(&bundle.onchain_public_key, "ocr2on_evm_");
        let signer = onchain.parse::<Address>().map_err(|e| ContractError::Initialization {
            contract: "Registry".to_string(),
            reason: format!("on-chain key {}: {e}", bundle.onchain_public_key),
        })?;
        Ok(Self {
            signer,
            transmitter,
            offchain_public_key: strip_key_prefix(&bundle.offchain_public_key, "ocr2off_evm_"),
            config_public_key: strip_key_prefix(&bundle.config_public_key, "ocr2cfg_evm_"),
            peer_id: peer_id.strip_prefix("p2p_").unwrap_or(peer_id).to_string(),
        })
    }
}

fn strip_key_prefix(key: &str, prefix: &str) -> String {
    let key = key.strip_prefix(prefix).unwrap_or(key);
    key.strip_prefix("0x").unwrap_or(key).to_string()
}

fn duration_nanos(field: &str, value: &str) -> ContractResult<u64> {
    let parsed: Duration = parse_duration(value).ok_or_else(|| ContractError::Initialization {
        contract: "Registry".to_string(),
        reason: format!("{field}: invalid duration {value:?}"),
    })?;
    Ok(parsed.as_nanos().min(u64::MAX as u128) as u64)
}

/// Encode the offchain half of the configuration.
///
/// The blob is a JSON document holding the protocol timing in
/// nanoseconds, the transmission schedule, the per-oracle offchain keys
/// and the plugin parameters. Oracle order is preserved. It is not wire
/// compatible with the OCR2 offchain config format.
pub fn encode_offchain_config(
    oracles: &[OracleIdentity],
    offchain: &OffchainConfig,
    ocr: &OcrConfig,
) -> ContractResult<Bytes> {
    let n = oracles.len();
    let f = ocr.max_faulty_nodes as usize;
    if n == 0 || n <= 3 * f {
        return Err(ContractError::Initialization {
            contract: "Registry".to_string(),
            reason: format!("{n} oracles cannot tolerate {f} faulty nodes (need n > 3f)"),
        });
    }

    let schedule: Vec<u32> = if ocr.schedule.is_empty() {
        vec![1; n]
    } else {
        ocr.schedule.clone()
    };

    let document = json!({
        "deltaProgress": duration_nanos("delta-progress", &ocr.delta_progress)?,
        "deltaResend": duration_nanos("delta-resend", &ocr.delta_resend)?,
        "deltaInitial": duration_nanos("delta-initial", &ocr.delta_initial)?,
        "deltaRound": duration_nanos("delta-round", &ocr.delta_round)?,
        "deltaGrace": duration_nanos("delta-grace", &ocr.delta_grace)?,
        "deltaCertifiedCommitRequest": duration_nanos(
            "delta-certified-commit-request",
            &ocr.delta_certified_commit_request,
        )?,
        "deltaStage": duration_nanos("delta-stage", &ocr.delta_stage)?,
        "rMax": ocr.max_rounds,
        "s": schedule,
        "offchainPublicKeys": oracles.iter().map(|o| &o.offchain_public_key).collect::<Vec<_>>(),
        "peerIds": oracles.iter().map(|o| &o.peer_id).collect::<Vec<_>>(),
        "configPublicKeys": oracles.iter().map(|o| &o.config_public_key).collect::<Vec<_>>(),
        "maxDurationQuery": duration_nanos("max-duration-query", &ocr.max_duration_query)?,
        "maxDurationObservation": duration_nanos(
            "max-duration-observation",
            &ocr.max_duration_observation,
        )?,
        "maxDurationShouldAcceptFinalizedReport": duration_nanos(
            "max-duration-should-accept",
            &ocr.max_duration_should_accept,
        )?,
        "maxDurationShouldTransmitAcceptedReport": duration_nanos(
            "max-duration-should-transmit",
            &ocr.max_duration_should_transmit,
        )?,
        "reportingPluginConfig": {
            "targetProbability": offchain.target_probability,
            "targetInRounds": offchain.target_in_rounds,
            "performLockoutWindow": offchain.perform_lockout_window,
            "gasLimitPerReport": offchain.gas_limit_per_report,
            "gasOverheadPerUpkeep": offchain.gas_overhead_per_upkeep,
            "minConfirmations": offchain.min_confirmations,
            "maxUpkeepBatchSize": offchain.max_upkeep_batch_size,
        },
    });
    serde_json::to_vec(&document)
        .map(Bytes::from)
        .map_err(|e| ContractError::Initialization {
            contract: "Registry".to_string(),
            reason: e.to_string(),
        })
}

pub(crate) fn onchain_config(cfg: &OnchainConfig) -> OnchainConfigV21 {
    OnchainConfigV21 {
        paymentPremiumPPB: cfg.payment_premium_ppb,
        flatFeeMicroLink: cfg.flat_fee_micro_link,
        checkGasLimit: cfg.check_gas_limit,
        stalenessSeconds: U24::saturating_from(cfg.staleness_seconds),
        gasCeilingMultiplier: cfg.gas_ceiling_multiplier,
        minUpkeepSpend: U96::from(cfg.min_upkeep_spend),
        maxPerformGas: cfg.max_perform_gas,
        maxCheckDataSize: cfg.max_check_data_size,
        maxPerformDataSize: cfg.max_perform_data_size,
        maxRevertDataSize: cfg.max_revert_data_size,
        fallbackGasPrice: U256::from(cfg.fallback_gas_price),
        fallbackLinkPrice: U256::from(cfg.fallback_link_price),
        transcoder: cfg.transcoder,
        registrars: cfg.registrars.clone(),
        upkeepPrivilegeManager: cfg.upkeep_privilege_manager,
    }
}

/// Build the `setConfigTypeSafe` call for `oracles` in the given order.
pub fn set_config_call(
    oracles: &[OracleIdentity],
    onchain: &OnchainConfig,
    offchain: &OffchainConfig,
    ocr: &OcrConfig,
) -> ContractResult<IKeeperRegistry::setConfigTypeSafeCall> {
    let offchain_config = encode_offchain_config(oracles, offchain, ocr)?;
    Ok(IKeeperRegistry::setConfigTypeSafeCall {
        signers: oracles.iter().map(|o| o.signer).collect(),
        transmitters: oracles.iter().map(|o| o.transmitter).collect(),
        f: ocr.max_faulty_nodes,
        onchainConfig: onchain_config(onchain),
        offchainConfigVersion: OFFCHAIN_CONFIG_VERSION,
        offchainConfig: offchain_config,
    })
}

/// Submit one configuration transaction binding `oracles` to the registry.
pub async fn set_offchain_config(
    cancel: &CancellationToken,
    catalog: &Catalog,
    registry: Address,
    oracles: &[OracleIdentity],
    onchain: &OnchainConfig,
    offchain: &OffchainConfig,
    ocr: &OcrConfig,
) -> ContractResult<TxReceipt> {
    let call = set_config_call(oracles, onchain, offchain, ocr)?;
    let receipt = catalog.transact(cancel, registry, call).await?;
    info!(%registry, oracles = oracles.len(), f = ocr.max_faulty_nodes, hash = %receipt.hash, "registry configured");
    Ok(receipt)
}
