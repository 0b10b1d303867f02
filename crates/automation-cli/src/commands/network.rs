use alloy_primitives::{Address, TxHash, U256};
use anyhow::Context as _;
use automation_chain::gateway::cancellable;
use automation_chain::parse_exp;
use automation_core::{Environment, NodeConfig};
use automation_node::{BringUp, NodeRole, Orchestrator};
use tracing::{info, warn};

use crate::commands::contract::registry;
use crate::context::Context;
use crate::error::WorkflowError;

/// One row of `network list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRow {
    pub name: String,
    pub url: Option<String>,
    pub address: Option<Address>,
    pub balance: Option<U256>,
}

fn bootstrap(env: &Environment) -> Result<&NodeConfig, WorkflowError> {
    env.bootstrap
        .as_ref()
        .ok_or(WorkflowError::BootstrapNotAvailable)
}

/// Bring up (or re-check) the bootstrap node.
pub async fn bootstrap_set(
    ctx: &Context,
    image: &str,
    log_level: &str,
    reset: bool,
) -> anyhow::Result<NodeConfig> {
    let mut env = ctx.load_environment()?;
    let registry = registry(&env)?.address;
    let mut node = env
        .bootstrap
        .clone()
        .unwrap_or_else(|| NodeConfig::bootstrap(image, log_level));
    node.image = image.to_string();
    node.log_level = log_level.to_string();

    let orchestrator = ctx.orchestrator(&env);
    let node = orchestrator
        .bring_up(
            ctx.cancel(),
            BringUp {
                node_dir: ctx.node_dir(&node.name),
                node,
                role: NodeRole::Bootstrap,
                registry,
                reset,
            },
        )
        .await
        .context("bringing up bootstrap node")?;
    env.bootstrap = Some(node.clone());
    ctx.save_environment(&env)?;
    Ok(node)
}

async fn bring_up_participant(
    ctx: &Context,
    orchestrator: &Orchestrator,
    env: &Environment,
    node: NodeConfig,
    reset: bool,
) -> anyhow::Result<NodeConfig> {
    let registry = registry(env)?.address;
    let bootstrapper = orchestrator.bootstrapper(bootstrap(env)?)?;
    let private_key = ctx
        .node_key(node.private_key_alias.as_deref())?
        .map(|key| key.value);
    let name = node.name.clone();
    orchestrator
        .bring_up(
            ctx.cancel(),
            BringUp {
                node_dir: ctx.node_dir(&node.name),
                node,
                role: NodeRole::Participant {
                    bootstrapper,
                    private_key,
                },
                registry,
                reset,
            },
        )
        .await
        .with_context(|| format!("bringing up {name}"))
}

/// Append `count` participants, bringing each fully up before the next.
///
/// The environment is saved after every node, so a failure keeps the
/// participants that came up before it.
pub async fn participant_add(
    ctx: &Context,
    image: &str,
    count: usize,
    log_level: &str,
) -> anyhow::Result<Vec<NodeConfig>> {
    let mut env = ctx.load_environment()?;
    registry(&env)?;
    bootstrap(&env)?;
    let orchestrator = ctx.orchestrator(&env);

    let mut added = Vec::with_capacity(count);
    for _ in 0..count {
        let node = env.push_participant(image, log_level)?.clone();
        let index = env.participants.len() - 1;
        let node = bring_up_participant(ctx, &orchestrator, &env, node, false).await?;
        env.participants[index] = node.clone();
        ctx.save_environment(&env)?;
        info!(node = %node.name, port = node.port, "participant added");
        added.push(node);
    }
    Ok(added)
}

/// Recreate one participant's containers with `image`, keeping its name and port.
pub async fn participant_reset(ctx: &Context, id: &str, image: &str) -> anyhow::Result<NodeConfig> {
    let mut env = ctx.load_environment()?;
    let (index, node) = env
        .participant(id)
        .map(|(i, n)| (i, n.clone()))
        .ok_or_else(|| WorkflowError::NodeNotFound(id.to_string()))?;
    let mut node = node;
    node.image = image.to_string();

    let orchestrator = ctx.orchestrator(&env);
    let node = bring_up_participant(ctx, &orchestrator, &env, node, true).await?;
    env.participants[index] = node.clone();
    ctx.save_environment(&env)?;
    Ok(node)
}

/// Remove the last participant, or all of them. Returns the removed names.
pub async fn participant_remove(ctx: &Context, all: bool) -> anyhow::Result<Vec<String>> {
    let mut env = ctx.load_environment()?;
    let removed: Vec<NodeConfig> = if all {
        std::mem::take(&mut env.participants)
    } else {
        env.participants.pop().into_iter().collect()
    };
    if removed.is_empty() {
        warn!("no participants to remove");
        return Ok(Vec::new());
    }

    let orchestrator = ctx.orchestrator(&env);
    for node in &removed {
        orchestrator
            .remove(ctx.cancel(), &node.name)
            .await
            .with_context(|| format!("removing {}", node.name))?;
        info!(node = %node.name, "participant removed");
    }
    ctx.save_environment(&env)?;
    Ok(removed.into_iter().map(|n| n.name).collect())
}

/// Send `amount` of native currency to a node's account.
pub async fn fund(ctx: &Context, node: &str, amount: &str) -> anyhow::Result<TxHash> {
    let amount = parse_exp(amount).with_context(|| format!("amount {amount:?}"))?;
    let env = ctx.load_environment()?;
    let target = env
        .node(node)
        .ok_or_else(|| WorkflowError::NodeNotFound(node.to_string()))?;
    let address = target
        .address
        .ok_or_else(|| WorkflowError::NodeAddressUnknown(target.name.clone()))?;
    let deployer = ctx.deployer(&env).await?;
    let receipt = deployer.send_native(ctx.cancel(), address, amount).await?;
    Ok(receipt.hash)
}

/// Every node with its URL, account and native balance.
pub async fn list(ctx: &Context) -> anyhow::Result<Vec<NodeRow>> {
    let env = ctx.load_environment()?;
    let nodes: Vec<&NodeConfig> = env.bootstrap.iter().chain(env.participants.iter()).collect();
    if nodes.is_empty() {
        return Ok(Vec::new());
    }

    let needs_chain = nodes.iter().any(|n| n.address.is_some());
    let client = if needs_chain {
        Some(ctx.chain_client(&env).await?)
    } else {
        None
    };

    let mut rows = Vec::with_capacity(nodes.len());
    for node in nodes {
        let balance = match (&client, node.address) {
            (Some(client), Some(address)) => {
                Some(cancellable(ctx.cancel(), client.balance(address)).await?)
            }
            _ => None,
        };
        rows.push(NodeRow {
            name: node.name.clone(),
            url: node.url.clone(),
            address: node.address,
            balance,
        });
    }
    Ok(rows)
}

pub fn format_rows(rows: &[NodeRow]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&format!(
            "{:<16} {:<24} {:<44} {}\n",
            row.name,
            row.url.as_deref().unwrap_or("-"),
            row.address.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
            row.balance.map(|b| b.to_string()).unwrap_or_else(|| "-".to_string()),
        ));
    }
    out
}
