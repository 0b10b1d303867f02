//! The upkeep registrar (v2.1).

use alloy_primitives::{Address, aliases::U96};
use alloy_sol_types::SolValue;
use automation_core::AutoApproveRule;
use tokio_util::sync::CancellationToken;

use crate::abi::InitialTriggerConfig;
use crate::catalog::Catalog;
use crate::error::ContractResult;

pub const ARTIFACT: &str = "AutomationRegistrar2_1";

/// Trigger type ids as the registrar numbers them.
pub const CONDITION_TRIGGER: u8 = 0;
pub const LOG_TRIGGER: u8 = 1;

#[derive(Debug, Clone)]
pub struct RegistrarDeploy {
    pub link: Address,
    pub registry: Address,
    pub min_link_juels: u64,
    pub conditional: AutoApproveRule,
    pub log_trigger: AutoApproveRule,
}

fn trigger_config(trigger_type: u8, rule: &AutoApproveRule) -> InitialTriggerConfig {
    InitialTriggerConfig {
        triggerType: trigger_type,
        autoApproveType: rule.auto_approve.as_u8(),
        autoApproveMaxAllowed: rule.max_allowed,
    }
}

pub(crate) fn constructor_args(cfg: &RegistrarDeploy) -> Vec<u8> {
    let triggers = vec![
        trigger_config(CONDITION_TRIGGER, &cfg.conditional),
        trigger_config(LOG_TRIGGER, &cfg.log_trigger),
    ];
    (cfg.link, cfg.registry, U96::from(cfg.min_link_juels), triggers).abi_encode_params()
}

pub(crate) async fn deploy(
    cancel: &CancellationToken,
    catalog: &Catalog,
    cfg: &RegistrarDeploy,
) -> ContractResult<Address> {
    catalog.create(cancel, ARTIFACT, constructor_args(cfg)).await
}
