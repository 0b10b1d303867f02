use alloy_primitives::{Address, U256};
use anyhow::Context as _;
use automation_chain::parse_exp;
use automation_contracts::{
    link, verifiable_load, Catalog, ContractKind, FeedDeploy, FeedKind, RegisterUpkeeps,
    RegistrarDeploy, RegistryDeploy, UpkeepStats, VerifiableLoadDeploy,
};
use automation_core::{
    Environment, FeedConfig, LinkTokenConfig, RegistrarConfig, RegistryConfig, RegistryMode,
    VerifiableLoadConfig, VerifiableLoadType,
};
use tracing::info;

use crate::context::Context;
use crate::error::WorkflowError;

fn parse_amount(raw: &str) -> anyhow::Result<U256> {
    parse_exp(raw).with_context(|| format!("amount {raw:?}"))
}

pub(crate) fn link_token(env: &Environment) -> Result<Address, WorkflowError> {
    env.link_token
        .as_ref()
        .map(|t| t.address)
        .ok_or(WorkflowError::LinkTokenNotAvailable)
}

fn feed(env: &Environment, kind: FeedKind) -> Result<Address, WorkflowError> {
    let config = match kind {
        FeedKind::LinkEth => env.link_eth_feed.as_ref(),
        FeedKind::FastGas => env.fast_gas_feed.as_ref(),
    };
    config
        .map(|f| f.address)
        .ok_or(WorkflowError::FeedNotAvailable(kind.label()))
}

pub(crate) fn registry(env: &Environment) -> Result<&RegistryConfig, WorkflowError> {
    env.registry.as_ref().ok_or(WorkflowError::RegistryNotAvailable)
}

fn registrar(env: &Environment) -> Result<Address, WorkflowError> {
    env.registrar
        .as_ref()
        .map(|r| r.address)
        .ok_or(WorkflowError::RegistrarNotAvailable)
}

fn verifiable_load_address(
    env: &Environment,
    kind: VerifiableLoadType,
) -> Result<Address, WorkflowError> {
    env.verifiable_load(kind)
        .map(|v| v.address)
        .ok_or(WorkflowError::VerifiableLoadNotAvailable(kind))
}

/// The registry deployment described by the environment.
pub(crate) fn registry_deploy(
    env: &Environment,
    mode: RegistryMode,
) -> Result<RegistryDeploy, WorkflowError> {
    Ok(RegistryDeploy {
        mode,
        link: link_token(env)?,
        link_eth_feed: feed(env, FeedKind::LinkEth)?,
        fast_gas_feed: feed(env, FeedKind::FastGas)?,
    })
}

fn set_feed(env: &mut Environment, kind: FeedKind, config: FeedConfig) {
    match kind {
        FeedKind::LinkEth => env.link_eth_feed = Some(config),
        FeedKind::FastGas => env.fast_gas_feed = Some(config),
    }
}

// ── LINK and feeds ────────────────────────────────────────────────

pub async fn deploy_link_token(ctx: &Context) -> anyhow::Result<Address> {
    let mut env = ctx.load_environment()?;
    let catalog = ctx.catalog(&env).await?;
    let address = ContractKind::LinkToken.deploy(ctx.cancel(), &catalog).await?;
    env.link_token = Some(LinkTokenConfig { address });
    ctx.save_environment(&env)?;
    Ok(address)
}

/// Mint `amount` juels to the deployer.
pub async fn mint(ctx: &Context, amount: &str) -> anyhow::Result<U256> {
    let amount = parse_amount(amount)?;
    let env = ctx.load_environment()?;
    let token = link_token(&env)?;
    let catalog = ctx.catalog(&env).await?;
    let to = catalog.deployer().address();
    link::mint(ctx.cancel(), &catalog, token, to, amount).await?;
    Ok(link::balance_of(ctx.cancel(), &catalog, token, to).await?)
}

pub async fn set_link_token_address(ctx: &Context, address: Address) -> anyhow::Result<()> {
    let mut env = ctx.load_environment()?;
    let catalog = ctx.catalog(&env).await?;
    ContractKind::LinkToken
        .connect(ctx.cancel(), address, &catalog)
        .await?;
    env.link_token = Some(LinkTokenConfig { address });
    ctx.save_environment(&env)
}

pub async fn deploy_feed(
    ctx: &Context,
    kind: FeedKind,
    answer: Option<&str>,
) -> anyhow::Result<Address> {
    let answer = answer.map(parse_amount).transpose()?;
    let mut env = ctx.load_environment()?;
    let catalog = ctx.catalog(&env).await?;
    let deploy = FeedDeploy::new(kind, answer);
    let answer = deploy.answer;
    let address = ContractKind::Feed(deploy)
        .deploy(ctx.cancel(), &catalog)
        .await?;
    set_feed(
        &mut env,
        kind,
        FeedConfig {
            address,
            decimals: kind.decimals(),
            answer: answer.to_string(),
        },
    );
    ctx.save_environment(&env)?;
    Ok(address)
}

pub async fn set_feed_address(
    ctx: &Context,
    kind: FeedKind,
    address: Address,
) -> anyhow::Result<()> {
    let mut env = ctx.load_environment()?;
    let catalog = ctx.catalog(&env).await?;
    ContractKind::Feed(FeedDeploy::new(kind, None))
        .connect(ctx.cancel(), address, &catalog)
        .await?;
    set_feed(
        &mut env,
        kind,
        FeedConfig {
            address,
            decimals: kind.decimals(),
            answer: String::new(),
        },
    );
    ctx.save_environment(&env)
}

// ── Registry and registrar ────────────────────────────────────────

/// Keep tuning from a previously bound registry when rebinding.
fn rebind_registry(env: &mut Environment, address: Address, mode: RegistryMode) {
    let mut config = RegistryConfig::new(address, mode);
    if let Some(previous) = env.registry.take() {
        config.onchain = previous.onchain;
        config.offchain = previous.offchain;
        config.ocr = previous.ocr;
    }
    env.set_registry(config);
}

pub async fn deploy_registry(ctx: &Context, mode: RegistryMode) -> anyhow::Result<Address> {
    let mut env = ctx.load_environment()?;
    let deploy = registry_deploy(&env, mode)?;
    let catalog = ctx.catalog(&env).await?;
    let address = ContractKind::Registry(deploy)
        .deploy(ctx.cancel(), &catalog)
        .await?;
    rebind_registry(&mut env, address, mode);
    ctx.save_environment(&env)?;
    Ok(address)
}

pub async fn set_registry_address(ctx: &Context, address: Address) -> anyhow::Result<()> {
    let mut env = ctx.load_environment()?;
    let catalog = ctx.catalog(&env).await?;
    catalog.ensure_code(ctx.cancel(), "Registry", address).await?;
    let mode = env.registry.as_ref().map(|r| r.mode).unwrap_or_default();
    rebind_registry(&mut env, address, mode);
    ctx.save_environment(&env)
}

fn registrar_config(env: &Environment, address: Address) -> RegistrarConfig {
    match &env.registrar {
        Some(previous) => RegistrarConfig {
            address,
            ..previous.clone()
        },
        None => RegistrarConfig::new(address),
    }
}

pub async fn deploy_registrar(ctx: &Context) -> anyhow::Result<Address> {
    let mut env = ctx.load_environment()?;
    let rules = registrar_config(&env, Address::ZERO);
    let deploy = RegistrarDeploy {
        link: link_token(&env)?,
        registry: registry(&env)?.address,
        min_link_juels: rules.min_link_juels,
        conditional: rules.conditional.clone(),
        log_trigger: rules.log_trigger.clone(),
    };
    let catalog = ctx.catalog(&env).await?;
    let address = ContractKind::Registrar(deploy)
        .deploy(ctx.cancel(), &catalog)
        .await?;
    env.set_registrar(registrar_config(&env, address));
    ctx.save_environment(&env)?;
    info!(%address, "registry registrars now [registrar]; run `registry set-config` to apply");
    Ok(address)
}

pub async fn set_registrar_address(ctx: &Context, address: Address) -> anyhow::Result<()> {
    let mut env = ctx.load_environment()?;
    let catalog = ctx.catalog(&env).await?;
    catalog.ensure_code(ctx.cancel(), "Registrar", address).await?;
    env.set_registrar(registrar_config(&env, address));
    ctx.save_environment(&env)
}

// ── Verifiable load ───────────────────────────────────────────────

pub async fn deploy_verifiable_load(
    ctx: &Context,
    kind: VerifiableLoadType,
) -> anyhow::Result<Address> {
    let mut env = ctx.load_environment()?;
    let registrar = registrar(&env)?;
    let (use_arbitrum, use_mercury) = match env.verifiable_load(kind) {
        Some(previous) => (previous.use_arbitrum, previous.use_mercury),
        None => (
            env.registry
                .as_ref()
                .is_some_and(|r| r.mode == RegistryMode::Arbitrum),
            false,
        ),
    };
    let catalog = ctx.catalog(&env).await?;
    let address = ContractKind::VerifiableLoad(VerifiableLoadDeploy {
        kind,
        registrar,
        use_arbitrum,
        use_mercury,
    })
    .deploy(ctx.cancel(), &catalog)
    .await?;
    env.set_verifiable_load(
        kind,
        VerifiableLoadConfig {
            address,
            use_arbitrum,
            use_mercury,
        },
    );
    ctx.save_environment(&env)?;
    Ok(address)
}

pub async fn set_verifiable_load_address(
    ctx: &Context,
    kind: VerifiableLoadType,
    address: Address,
) -> anyhow::Result<()> {
    let mut env = ctx.load_environment()?;
    let catalog = ctx.catalog(&env).await?;
    catalog.ensure_code(ctx.cancel(), "VerifiableLoad", address).await?;
    let mut config = env.verifiable_load(kind).cloned().unwrap_or(VerifiableLoadConfig {
        address,
        use_arbitrum: false,
        use_mercury: false,
    });
    config.address = address;
    env.set_verifiable_load(kind, config);
    ctx.save_environment(&env)
}

/// Options of `register-upkeeps` beyond the registration parameters.
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    pub params: RegisterUpkeeps,
    pub send_link: bool,
    pub cancel_first: bool,
}

pub async fn register_upkeeps(
    ctx: &Context,
    kind: VerifiableLoadType,
    options: &RegisterOptions,
) -> anyhow::Result<Vec<U256>> {
    let env = ctx.load_environment()?;
    let contract = verifiable_load_address(&env, kind)?;
    let catalog = ctx.catalog(&env).await?;

    if options.cancel_first {
        verifiable_load::cancel_upkeeps(ctx.cancel(), &catalog, contract).await?;
    }
    if options.send_link {
        fund_contract(ctx, &catalog, &env, contract, &options.params).await?;
    }
    Ok(verifiable_load::register_upkeeps(ctx.cancel(), &catalog, kind, contract, &options.params)
        .await?)
}

async fn fund_contract(
    ctx: &Context,
    catalog: &Catalog,
    env: &Environment,
    contract: Address,
    params: &RegisterUpkeeps,
) -> anyhow::Result<()> {
    let token = link_token(env)?;
    let total = params.amount.saturating_mul(U256::from(params.count));
    link::transfer(ctx.cancel(), catalog, token, contract, total).await?;
    Ok(())
}

pub async fn cancel_upkeeps(ctx: &Context, kind: VerifiableLoadType) -> anyhow::Result<Vec<U256>> {
    let env = ctx.load_environment()?;
    let contract = verifiable_load_address(&env, kind)?;
    let catalog = ctx.catalog(&env).await?;
    Ok(verifiable_load::cancel_upkeeps(ctx.cancel(), &catalog, contract).await?)
}

pub async fn get_stats(ctx: &Context, kind: VerifiableLoadType) -> anyhow::Result<Vec<UpkeepStats>> {
    let env = ctx.load_environment()?;
    let contract = verifiable_load_address(&env, kind)?;
    let catalog = ctx.catalog(&env).await?;
    Ok(verifiable_load::stats(ctx.cancel(), &catalog, contract).await?)
}

/// Render stats as a fixed-width table.
pub fn format_stats(stats: &[UpkeepStats]) -> String {
    let mut out = format!(
        "{:<80} {:>10} {:>8} {:>8} {:>8} {:>8}\n",
        "upkeep", "performs", "p50", "p90", "p95", "p99"
    );
    for s in stats {
        let delay = |p: u64| {
            s.delays
                .iter()
                .find(|(pct, _)| *pct == p)
                .map(|(_, d)| d.to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        out.push_str(&format!(
            "{:<80} {:>10} {:>8} {:>8} {:>8} {:>8}\n",
            s.id,
            s.performs,
            delay(50),
            delay(90),
            delay(95),
            delay(99)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_table_marks_missing_percentiles() {
        let table = format_stats(&[
            UpkeepStats {
                id: U256::from(7),
                performs: U256::from(3),
                delays: vec![(50, U256::from(1)), (90, U256::from(2))],
            },
            UpkeepStats {
                id: U256::from(8),
                performs: U256::ZERO,
                delays: Vec::new(),
            },
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("upkeep"));
        let row: Vec<&str> = lines[1].split_whitespace().collect();
        assert_eq!(row, vec!["7", "3", "1", "2", "-", "-"]);
        assert!(lines[2].split_whitespace().skip(2).all(|c| c == "-"));
    }

    #[test]
    fn registry_deploy_requires_token_and_feeds() {
        let mut env = Environment::default();
        assert!(matches!(
            registry_deploy(&env, RegistryMode::Default),
            Err(WorkflowError::LinkTokenNotAvailable)
        ));
        env.link_token = Some(LinkTokenConfig {
            address: Address::repeat_byte(1),
        });
        assert!(matches!(
            registry_deploy(&env, RegistryMode::Default),
            Err(WorkflowError::FeedNotAvailable("LinkETHFeed"))
        ));
    }

    #[test]
    fn rebinding_registry_keeps_tuning_and_registrar() {
        let mut env = Environment::default();
        env.set_registrar(RegistrarConfig::new(Address::repeat_byte(9)));
        let mut config = RegistryConfig::new(Address::repeat_byte(1), RegistryMode::Default);
        config.ocr.max_faulty_nodes = 2;
        env.set_registry(config);

        rebind_registry(&mut env, Address::repeat_byte(2), RegistryMode::Arbitrum);
        let registry = env.registry.as_ref().unwrap();
        assert_eq!(registry.address, Address::repeat_byte(2));
        assert_eq!(registry.mode, RegistryMode::Arbitrum);
        assert_eq!(registry.ocr.max_faulty_nodes, 2);
        assert_eq!(registry.onchain.registrars, vec![Address::repeat_byte(9)]);
        env.validate().unwrap();
    }
}
