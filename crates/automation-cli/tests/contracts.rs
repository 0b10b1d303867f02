//! Contract commands against the in-memory chain.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use automation_chain::FakeChain;
use automation_cli::cli::GlobalOptions;
use automation_cli::commands::{config, contract, key, network};
use automation_cli::{Context, WorkflowError};
use automation_contracts::FeedKind;
use automation_core::{RegistryMode, VerifiableLoadType};
use tokio_util::sync::CancellationToken;

const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

const ARTIFACTS: &[&str] = &[
    "LinkToken",
    "MockV3Aggregator",
    "AutomationForwarderLogic",
    "KeeperRegistryLogicB2_1",
    "KeeperRegistryLogicA2_1",
    "KeeperRegistry2_1",
    "AutomationRegistrar2_1",
    "VerifiableLoadUpkeep",
    "VerifiableLoadLogTriggerUpkeep",
];

struct Harness {
    _dir: tempfile::TempDir,
    chain: FakeChain,
    ctx: Context,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = dir.path().join("artifacts");
    std::fs::create_dir(&artifacts).unwrap();
    for (i, name) in ARTIFACTS.iter().enumerate() {
        std::fs::write(
            artifacts.join(format!("{name}.json")),
            format!(r#"{{"bytecode": "0x60{i:02x}"}}"#),
        )
        .unwrap();
    }

    let chain = FakeChain::new(31337);
    let global = GlobalOptions {
        state_directory: dir.path().display().to_string(),
        environment: "dev".to_string(),
        key: String::new(),
        verbose: false,
    };
    let ctx = Context::new(&global, CancellationToken::new()).with_chain(Arc::new(chain.clone()));

    config::set(&ctx, "chain-id", "31337").unwrap();
    key::store(&ctx, "default", &mut std::io::Cursor::new(DEV_KEY)).unwrap();
    Harness {
        _dir: dir,
        chain,
        ctx,
    }
}

fn workflow_error(err: &anyhow::Error) -> &WorkflowError {
    err.downcast_ref::<WorkflowError>()
        .unwrap_or_else(|| panic!("not a workflow error: {err:#}"))
}

async fn deploy_token_and_feeds(ctx: &Context) {
    contract::deploy_link_token(ctx).await.unwrap();
    contract::deploy_feed(ctx, FeedKind::LinkEth, None).await.unwrap();
    contract::deploy_feed(ctx, FeedKind::FastGas, Some("30e9"))
        .await
        .unwrap();
}

#[tokio::test]
async fn full_contract_stack_is_recorded_in_environment() {
    let h = harness();
    deploy_token_and_feeds(&h.ctx).await;
    let registry = contract::deploy_registry(&h.ctx, RegistryMode::Arbitrum)
        .await
        .unwrap();
    let registrar = contract::deploy_registrar(&h.ctx).await.unwrap();
    let load = contract::deploy_verifiable_load(&h.ctx, VerifiableLoadType::Conditional)
        .await
        .unwrap();

    let env = h.ctx.load_environment().unwrap();
    assert!(env.link_token.is_some());
    let fast_gas = env.fast_gas_feed.as_ref().unwrap();
    assert_eq!(fast_gas.decimals, 0);
    assert_eq!(fast_gas.answer, "30000000000");
    assert_eq!(env.link_eth_feed.as_ref().unwrap().decimals, 18);

    let stored = env.registry.as_ref().unwrap();
    assert_eq!(stored.address, registry);
    assert_eq!(stored.mode, RegistryMode::Arbitrum);
    assert_eq!(stored.onchain.registrars, vec![registrar]);
    assert_eq!(env.registrar.as_ref().unwrap().address, registrar);

    let vl = env.verifiable_load(VerifiableLoadType::Conditional).unwrap();
    assert_eq!(vl.address, load);
    assert!(vl.use_arbitrum);

    // token, two feeds, four registry creations, registrar, verifiable load
    assert_eq!(h.chain.sent().len(), 9);
}

#[tokio::test]
async fn deploys_check_their_dependencies_first() {
    let h = harness();

    let err = contract::deploy_registry(&h.ctx, RegistryMode::Default)
        .await
        .unwrap_err();
    assert!(matches!(workflow_error(&err), WorkflowError::LinkTokenNotAvailable));

    contract::deploy_link_token(&h.ctx).await.unwrap();
    let err = contract::deploy_registry(&h.ctx, RegistryMode::Default)
        .await
        .unwrap_err();
    assert!(matches!(
        workflow_error(&err),
        WorkflowError::FeedNotAvailable("LinkETHFeed")
    ));

    let err = contract::deploy_registrar(&h.ctx).await.unwrap_err();
    assert!(matches!(workflow_error(&err), WorkflowError::RegistryNotAvailable));

    let err = contract::deploy_verifiable_load(&h.ctx, VerifiableLoadType::LogTrigger)
        .await
        .unwrap_err();
    assert!(matches!(workflow_error(&err), WorkflowError::RegistrarNotAvailable));

    // Only the token went out.
    assert_eq!(h.chain.sent().len(), 1);
}

#[tokio::test]
async fn set_address_requires_code() {
    let h = harness();
    let empty = Address::repeat_byte(0x42);
    assert!(contract::set_link_token_address(&h.ctx, empty).await.is_err());
    assert!(h.ctx.load_environment().unwrap().link_token.is_none());

    h.chain.set_code(empty, Bytes::from_static(&[0x60, 0x00]));
    contract::set_link_token_address(&h.ctx, empty).await.unwrap();
    assert_eq!(
        h.ctx.load_environment().unwrap().link_token.unwrap().address,
        empty
    );
}

#[tokio::test]
async fn registry_redeploy_keeps_tuning() {
    let h = harness();
    deploy_token_and_feeds(&h.ctx).await;
    contract::deploy_registry(&h.ctx, RegistryMode::Default)
        .await
        .unwrap();
    config::set(&h.ctx, "registry.ocr.max-faulty-nodes", "2").unwrap();

    let second = contract::deploy_registry(&h.ctx, RegistryMode::Optimism)
        .await
        .unwrap();
    let env = h.ctx.load_environment().unwrap();
    let registry = env.registry.unwrap();
    assert_eq!(registry.address, second);
    assert_eq!(registry.mode, RegistryMode::Optimism);
    assert_eq!(registry.ocr.max_faulty_nodes, 2);
}

#[tokio::test]
async fn set_config_without_participants_fails_before_sending() {
    let h = harness();
    deploy_token_and_feeds(&h.ctx).await;
    contract::deploy_registry(&h.ctx, RegistryMode::Default)
        .await
        .unwrap();
    let sent = h.chain.sent().len();

    let err = automation_cli::workflow::set_config(&h.ctx, None)
        .await
        .unwrap_err();
    assert!(matches!(workflow_error(&err), WorkflowError::NoParticipants));
    assert_eq!(h.chain.sent().len(), sent);
}

#[tokio::test]
async fn fund_resolves_participant_by_index() {
    let h = harness();
    let mut env = h.ctx.load_environment().unwrap();
    env.push_participant("node:latest", "info").unwrap();
    let target = Address::repeat_byte(0x55);
    env.push_participant("node:latest", "info").unwrap().address = Some(target);
    h.ctx.save_environment(&env).unwrap();

    let err = network::fund(&h.ctx, "0", "1e18").await.unwrap_err();
    assert!(matches!(
        workflow_error(&err),
        WorkflowError::NodeAddressUnknown(_)
    ));
    let err = network::fund(&h.ctx, "7", "1e18").await.unwrap_err();
    assert!(matches!(workflow_error(&err), WorkflowError::NodeNotFound(_)));

    network::fund(&h.ctx, "1", "2e18").await.unwrap();
    let tx = h.chain.sent().pop().unwrap();
    assert_eq!(tx.to, Some(target));
    assert_eq!(tx.value, U256::from(2_000_000_000_000_000_000u64));

    let rows = network::list(&h.ctx).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].balance, None);
    assert_eq!(rows[1].balance, Some(U256::from(2_000_000_000_000_000_000u64)));
}

#[tokio::test]
async fn override_key_must_exist() {
    let h = harness();
    let global = GlobalOptions {
        state_directory: h.ctx.store().root().display().to_string(),
        environment: "dev".to_string(),
        key: "missing".to_string(),
        verbose: false,
    };
    let ctx = Context::new(&global, CancellationToken::new()).with_chain(Arc::new(h.chain.clone()));
    let err = contract::deploy_link_token(&ctx).await.unwrap_err();
    assert!(matches!(workflow_error(&err), WorkflowError::KeyNotFound(alias) if alias == "missing"));
}
