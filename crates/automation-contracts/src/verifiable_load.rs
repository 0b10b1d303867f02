//! Verifiable-load upkeep contracts used to drive measurable load.
//!
//! Both variants register upkeeps through the registrar they were
//! constructed with, so the contract must hold enough LINK to fund them.

use alloy_primitives::{Address, B256, Bytes, U256, aliases::U96};
use alloy_sol_types::{SolEvent, SolValue};
use automation_core::VerifiableLoadType;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::abi::{IVerifiableLoad, LogTriggerConfig};
use crate::catalog::Catalog;
use crate::error::ContractResult;
use crate::registrar::{CONDITION_TRIGGER, LOG_TRIGGER};

pub const CONDITIONAL_ARTIFACT: &str = "VerifiableLoadUpkeep";
pub const LOG_TRIGGER_ARTIFACT: &str = "VerifiableLoadLogTriggerUpkeep";

/// Percentiles reported by [`stats`].
pub const PERCENTILES: [u64; 4] = [50, 90, 95, 99];

pub(crate) fn label(kind: VerifiableLoadType) -> &'static str {
    match kind {
        VerifiableLoadType::Conditional => "VerifiableLoad",
        VerifiableLoadType::LogTrigger => "VerifiableLoadLogTrigger",
    }
}

#[derive(Debug, Clone)]
pub struct VerifiableLoadDeploy {
    pub kind: VerifiableLoadType,
    pub registrar: Address,
    pub use_arbitrum: bool,
    pub use_mercury: bool,
}

pub(crate) fn constructor_args(cfg: &VerifiableLoadDeploy) -> Vec<u8> {
    match cfg.kind {
        VerifiableLoadType::Conditional => (cfg.registrar, cfg.use_arbitrum).abi_encode_params(),
        VerifiableLoadType::LogTrigger => {
            (cfg.registrar, cfg.use_arbitrum, cfg.use_mercury).abi_encode_params()
        }
    }
}

pub(crate) async fn deploy(
    cancel: &CancellationToken,
    catalog: &Catalog,
    cfg: &VerifiableLoadDeploy,
) -> ContractResult<Address> {
    let artifact = match cfg.kind {
        VerifiableLoadType::Conditional => CONDITIONAL_ARTIFACT,
        VerifiableLoadType::LogTrigger => LOG_TRIGGER_ARTIFACT,
    };
    catalog.create(cancel, artifact, constructor_args(cfg)).await
}

/// Parameters of one `register-upkeeps` run.
#[derive(Debug, Clone)]
pub struct RegisterUpkeeps {
    pub count: u32,
    pub gas_limit: u32,
    /// LINK funding per upkeep, in juels.
    pub amount: U256,
    pub check_gas_to_burn: U256,
    pub perform_gas_to_burn: U256,
    /// Blocks between performs.
    pub interval: u32,
}

impl Default for RegisterUpkeeps {
    fn default() -> Self {
        Self {
            count: 5,
            gas_limit: 500_000,
            amount: U256::from(1_000_000_000_000_000_000u64),
            check_gas_to_burn: U256::ZERO,
            perform_gas_to_burn: U256::ZERO,
            interval: 15,
        }
    }
}

/// Trigger type and encoded trigger config for upkeeps of `kind`.
///
/// Log-trigger upkeeps listen for the contract's own `LogEmitted` event.
pub fn trigger(kind: VerifiableLoadType, contract: Address) -> (u8, Bytes) {
    match kind {
        VerifiableLoadType::Conditional => (CONDITION_TRIGGER, Bytes::new()),
        VerifiableLoadType::LogTrigger => {
            let config = LogTriggerConfig {
                contractAddress: contract,
                filterSelector: 0,
                topic0: IVerifiableLoad::LogEmitted::SIGNATURE_HASH,
                topic1: B256::ZERO,
                topic2: B256::ZERO,
                topic3: B256::ZERO,
            };
            (LOG_TRIGGER, Bytes::from(config.abi_encode()))
        }
    }
}

/// Register `params.count` upkeeps and set their perform interval.
///
/// Registration is batched 255 at a time. Returns every active upkeep id
/// the contract owns afterwards.
pub async fn register_upkeeps(
    cancel: &CancellationToken,
    catalog: &Catalog,
    kind: VerifiableLoadType,
    contract: Address,
    params: &RegisterUpkeeps,
) -> ContractResult<Vec<U256>> {
    let (trigger_type, trigger_config) = trigger(kind, contract);
    let amount = U96::saturating_from(params.amount);

    let mut remaining = params.count;
    while remaining > 0 {
        let batch = remaining.min(u8::MAX as u32) as u8;
        catalog
            .transact(
                cancel,
                contract,
                IVerifiableLoad::batchRegisterUpkeepsCall {
                    number: batch,
                    gasLimit: params.gas_limit,
                    triggerType: trigger_type,
                    triggerConfig: trigger_config.clone(),
                    amount,
                    checkGasToBurn: params.check_gas_to_burn,
                    performGasToBurn: params.perform_gas_to_burn,
                },
            )
            .await?;
        debug!(%contract, batch, "registered upkeep batch");
        remaining -= batch as u32;
    }

    let ids = active_upkeeps(cancel, catalog, contract).await?;
    if !ids.is_empty() {
        catalog
            .transact(
                cancel,
                contract,
                IVerifiableLoad::batchSetIntervalsCall {
                    upkeepIds: ids.clone(),
                    interval: params.interval,
                },
            )
            .await?;
    }
    info!(%contract, %kind, registered = params.count, active = ids.len(), interval = params.interval, "upkeeps registered");
    Ok(ids)
}

/// Active upkeep ids deployed by `contract`.
pub async fn active_upkeeps(
    cancel: &CancellationToken,
    catalog: &Catalog,
    contract: Address,
) -> ContractResult<Vec<U256>> {
    // maxCount 0 means "all".
    catalog
        .call(
            cancel,
            "VerifiableLoad",
            contract,
            IVerifiableLoad::getActiveUpkeepIDsDeployedByThisContractCall {
                startIndex: U256::ZERO,
                maxCount: U256::ZERO,
            },
        )
        .await
}

/// Cancel every active upkeep the contract deployed. Returns the cancelled ids.
pub async fn cancel_upkeeps(
    cancel: &CancellationToken,
    catalog: &Catalog,
    contract: Address,
) -> ContractResult<Vec<U256>> {
    let ids = active_upkeeps(cancel, catalog, contract).await?;
    if ids.is_empty() {
        info!(%contract, "no active upkeeps to cancel");
        return Ok(ids);
    }
    catalog
        .transact(
            cancel,
            contract,
            IVerifiableLoad::batchCancelUpkeepsCall {
                upkeepIds: ids.clone(),
            },
        )
        .await?;
    info!(%contract, cancelled = ids.len(), "upkeeps cancelled");
    Ok(ids)
}

/// Perform count and delay percentiles for one upkeep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpkeepStats {
    pub id: U256,
    pub performs: U256,
    /// `(percentile, delay in blocks)` over every recorded perform.
    pub delays: Vec<(u64, U256)>,
}

pub async fn stats(
    cancel: &CancellationToken,
    catalog: &Catalog,
    contract: Address,
) -> ContractResult<Vec<UpkeepStats>> {
    let ids = active_upkeeps(cancel, catalog, contract).await?;
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let performs = catalog
            .call(
                cancel,
                "VerifiableLoad",
                contract,
                IVerifiableLoad::countersCall { upkeepId: id },
            )
            .await?;
        let mut delays = Vec::with_capacity(PERCENTILES.len());
        if !performs.is_zero() {
            for p in PERCENTILES {
                let delay = catalog
                    .call(
                        cancel,
                        "VerifiableLoad",
                        contract,
                        IVerifiableLoad::getPxDelayLastNPerformsCall {
                            upkeepId: id,
                            p: U256::from(p),
                            n: performs,
                        },
                    )
                    .await?;
                delays.push((p, delay));
            }
        }
        out.push(UpkeepStats {
            id,
            performs,
            delays,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditional_trigger_has_empty_config() {
        let (ty, cfg) = trigger(VerifiableLoadType::Conditional, Address::repeat_byte(1));
        assert_eq!(ty, 0);
        assert!(cfg.is_empty());
    }

    #[test]
    fn log_trigger_watches_own_event() {
        let contract = Address::repeat_byte(7);
        let (ty, cfg) = trigger(VerifiableLoadType::LogTrigger, contract);
        assert_eq!(ty, 1);
        assert_eq!(cfg.len(), 6 * 32);
        assert_eq!(&cfg[12..32], contract.as_slice());
        assert_eq!(
            &cfg[64..96],
            alloy_primitives::keccak256("LogEmitted(uint256,uint256,address)").as_slice()
        );
    }

    #[test]
    fn log_trigger_constructor_carries_mercury_flag() {
        let cfg = VerifiableLoadDeploy {
            kind: VerifiableLoadType::LogTrigger,
            registrar: Address::repeat_byte(3),
            use_arbitrum: false,
            use_mercury: true,
        };
        let args = constructor_args(&cfg);
        assert_eq!(args.len(), 96);
        assert_eq!(args[95], 1);

        let conditional = VerifiableLoadDeploy {
            kind: VerifiableLoadType::Conditional,
            ..cfg
        };
        assert_eq!(constructor_args(&conditional).len(), 64);
    }
}
