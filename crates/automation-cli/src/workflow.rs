//! Registry set-config: gather every participant's public keys and bind
//! them to the registry in one transaction.
//!
//! Keys are collected concurrently but assembled in environment order,
//! which becomes the oracle order on-chain. Any node that cannot be
//! reached aborts the workflow before a transaction is built.

use anyhow::Context as _;
use automation_chain::TxReceipt;
use automation_contracts::registry::set_offchain_config;
use automation_contracts::{ContractKind, OracleIdentity};
use automation_core::NodeConfig;
use automation_core::parallel::{job, Job, WorkerPool};
use automation_node::{NodeClient, NodeError, OrchestratorSettings};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::commands::contract::{registry, registry_deploy};
use crate::context::Context;
use crate::error::WorkflowError;

/// Upper bound on nodes contacted at once.
const KEY_COLLECTION_PARALLELISM: usize = 8;

/// Fetch the identity one participant contributes to the oracle set.
async fn oracle_identity(
    cancel: &CancellationToken,
    url: &str,
    node: &NodeConfig,
) -> Result<OracleIdentity, NodeError> {
    let client = NodeClient::new(url, &node.login, &node.password)?;
    client.authenticate(cancel).await?;
    let bundle = client.ocr2_bundle(cancel).await?;
    let peer_id = client.p2p_key_id(cancel).await?;
    let transmitter = match node.address {
        Some(address) => address,
        None => client
            .eth_keys(cancel)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| NodeError::Key(format!("{} has no EVM key", node.name)))?,
    };
    debug!(node = %node.name, bundle = %bundle.bundle_id, %transmitter, "collected oracle keys");
    OracleIdentity::from_bundle(&bundle, &peer_id, transmitter)
        .map_err(|e| NodeError::Encoding(e.to_string()))
}

/// Identities of `participants`, in the order given.
pub async fn collect_oracles(
    cancel: &CancellationToken,
    settings: &OrchestratorSettings,
    participants: &[NodeConfig],
) -> Result<Vec<OracleIdentity>, WorkflowError> {
    let jobs: Vec<Job<(usize, Result<OracleIdentity, WorkflowError>)>> = participants
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, node)| {
            let url = node.url.clone().unwrap_or_else(|| settings.node_url(&node));
            job(move |token: CancellationToken| async move {
                let result = oracle_identity(&token, &url, &node).await.map_err(|e| match e {
                    NodeError::Cancelled => WorkflowError::Cancelled,
                    source => WorkflowError::NodeUnreachable {
                        node: node.name.clone(),
                        source,
                    },
                });
                (index, result)
            })
        })
        .collect();

    let mut results = WorkerPool::new(KEY_COLLECTION_PARALLELISM)
        .run(cancel, jobs)
        .await;
    if results.len() < participants.len() {
        return Err(WorkflowError::Cancelled);
    }
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}

/// Apply the environment's configuration and the participants' keys to
/// the registry. `max_faulty` overrides the stored fault tolerance and is
/// persisted on success.
pub async fn set_config(ctx: &Context, max_faulty: Option<u8>) -> anyhow::Result<TxReceipt> {
    let mut env = ctx.load_environment()?;
    let mut target = registry(&env)?.clone();
    // Also requires the LINK token and both feeds.
    let deploy = registry_deploy(&env, target.mode)?;
    if env.participants.is_empty() {
        return Err(WorkflowError::NoParticipants.into());
    }
    if let Some(f) = max_faulty {
        target.ocr.max_faulty_nodes = f;
    }

    let catalog = ctx.catalog(&env).await?;
    ContractKind::Registry(deploy)
        .connect(ctx.cancel(), target.address, &catalog)
        .await
        .context("connecting to registry")?;

    let settings = ctx.orchestrator(&env).settings().clone();
    let oracles = collect_oracles(ctx.cancel(), &settings, &env.participants).await?;
    info!(oracles = oracles.len(), f = target.ocr.max_faulty_nodes, "submitting registry configuration");

    let receipt = set_offchain_config(
        ctx.cancel(),
        &catalog,
        target.address,
        &oracles,
        &target.onchain,
        &target.offchain,
        &target.ocr,
    )
    .await
    .map_err(WorkflowError::from)?;

    env.set_registry(target);
    ctx.save_environment(&env)?;
    Ok(receipt)
}
