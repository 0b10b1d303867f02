//! Workflow coordinator behind the `automation-cli` binary.
//!
//! Each command loads the selected environment, composes the state store,
//! chain gateway, contract catalog and node orchestrator, and saves the
//! environment once on success. Results go to stdout; logs go to stderr.

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod workflow;

use automation_chain::{explorer_link, parse_exp};
use automation_contracts::{FeedKind, RegisterUpkeeps};

use crate::cli::{
    BootstrapAction, Command, ConfigAction, ContractTarget, KeyAction, LinkAction, NetworkAction,
    ParticipantAction, RegistrarAction, RegistryAction, VerifiableLoadAction,
};
use crate::commands::config::SetupValues;
use crate::commands::contract::RegisterOptions;
use crate::commands::{config, contract, key, network};
pub use crate::context::Context;
pub use crate::error::WorkflowError;

/// Run one parsed command to completion.
pub async fn run(ctx: &Context, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Config { action } => run_config(ctx, action),
        Command::Key { action } => run_key(ctx, action),
        Command::Contract { target } => run_contract(ctx, target).await,
        Command::Network { action } => run_network(ctx, action).await,
    }
}

fn run_config(ctx: &Context, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Setup {
            chain_id,
            http_url,
            ws_url,
            key_alias,
        } => config::setup(
            ctx,
            SetupValues {
                chain_id,
                http_url,
                ws_url,
                key_alias,
            },
        ),
        ConfigAction::Delete => config::delete(ctx),
        ConfigAction::Set { key, value } => config::set(ctx, &key, &value),
        ConfigAction::Get { key } => {
            println!("{}", config::get(ctx, &key)?);
            Ok(())
        }
    }
}

fn run_key(ctx: &Context, action: KeyAction) -> anyhow::Result<()> {
    let imported = match action {
        KeyAction::Create { name } => vec![key::create(ctx, &name)?],
        KeyAction::Store { name } => {
            let stdin = std::io::stdin();
            vec![key::store(ctx, &name, &mut stdin.lock())?]
        }
        KeyAction::List => {
            for (alias, address) in key::list(ctx)? {
                println!("{alias:<24} {address}");
            }
            return Ok(());
        }
        KeyAction::Delete { name } => {
            for alias in key::delete(ctx, &name)? {
                println!("deleted {alias}");
            }
            return Ok(());
        }
        KeyAction::ImportGanache { file } => key::import_ganache(ctx, &file)?,
        KeyAction::ImportGeth {
            name,
            path,
            password,
        } => key::import_geth(ctx, &name, &path, password.as_deref())?,
    };
    for k in imported {
        println!("{:<24} {}", k.alias, k.address);
    }
    Ok(())
}

async fn run_contract(ctx: &Context, target: ContractTarget) -> anyhow::Result<()> {
    match target {
        ContractTarget::Link { action } => match action {
            LinkAction::DeployToken => {
                println!("{}", contract::deploy_link_token(ctx).await?);
            }
            LinkAction::Mint { amount } => {
                let balance = contract::mint(ctx, &amount).await?;
                println!("deployer LINK balance: {balance}");
            }
            LinkAction::SetTokenAddress { address } => {
                contract::set_link_token_address(ctx, address).await?;
            }
            LinkAction::DeployFeed { kind, answer } => {
                println!("{}", contract::deploy_feed(ctx, kind, answer.as_deref()).await?);
            }
            LinkAction::SetLinkEthFeedAddress { address } => {
                contract::set_feed_address(ctx, FeedKind::LinkEth, address).await?;
            }
            LinkAction::SetFastGasFeedAddress { address } => {
                contract::set_feed_address(ctx, FeedKind::FastGas, address).await?;
            }
        },
        ContractTarget::Registry { action } => match action {
            RegistryAction::Deploy { mode } => {
                println!("{}", contract::deploy_registry(ctx, mode).await?);
            }
            RegistryAction::SetAddress { address } => {
                contract::set_registry_address(ctx, address).await?;
            }
            RegistryAction::SetConfig { max_faulty } => {
                let receipt = workflow::set_config(ctx, max_faulty).await?;
                let chain_id = ctx.load_environment()?.chain_id;
                println!("{}", explorer_link(chain_id, receipt.hash));
            }
        },
        ContractTarget::Registrar { action } => match action {
            RegistrarAction::Deploy => {
                println!("{}", contract::deploy_registrar(ctx).await?);
            }
            RegistrarAction::SetAddress { address } => {
                contract::set_registrar_address(ctx, address).await?;
            }
        },
        ContractTarget::VerifiableLoad { action } => match action {
            VerifiableLoadAction::Deploy { load } => {
                println!("{}", contract::deploy_verifiable_load(ctx, load.kind).await?);
            }
            VerifiableLoadAction::SetAddress { address, load } => {
                contract::set_verifiable_load_address(ctx, load.kind, address).await?;
            }
            VerifiableLoadAction::RegisterUpkeeps {
                load,
                count,
                interval,
                amount,
                gas_limit,
                send_link,
                cancel_upkeeps,
            } => {
                let options = RegisterOptions {
                    params: RegisterUpkeeps {
                        count,
                        interval,
                        gas_limit,
                        amount: parse_exp(&amount)?,
                        ..RegisterUpkeeps::default()
                    },
                    send_link,
                    cancel_first: cancel_upkeeps,
                };
                for id in contract::register_upkeeps(ctx, load.kind, &options).await? {
                    println!("{id}");
                }
            }
            VerifiableLoadAction::CancelUpkeeps { load } => {
                let cancelled = contract::cancel_upkeeps(ctx, load.kind).await?;
                println!("cancelled {} upkeeps", cancelled.len());
            }
            VerifiableLoadAction::GetStats { load } => {
                let stats = contract::get_stats(ctx, load.kind).await?;
                print!("{}", contract::format_stats(&stats));
            }
        },
    }
    Ok(())
}

async fn run_network(ctx: &Context, action: NetworkAction) -> anyhow::Result<()> {
    match action {
        NetworkAction::Bootstrap {
            action:
                BootstrapAction::Set {
                    image,
                    log_level,
                    reset,
                },
        } => {
            let node = network::bootstrap_set(ctx, &image, &log_level, reset).await?;
            println!("{} {}", node.name, node.url.unwrap_or_default());
        }
        NetworkAction::Participant { action } => match action {
            ParticipantAction::Add {
                image,
                count,
                log_level,
            } => {
                for node in network::participant_add(ctx, &image, count, &log_level).await? {
                    println!("{} {}", node.name, node.url.unwrap_or_default());
                }
            }
            ParticipantAction::Reset { id, image } => {
                let node = network::participant_reset(ctx, &id, &image).await?;
                println!("{} {}", node.name, node.url.unwrap_or_default());
            }
            ParticipantAction::Remove { all } => {
                for name in network::participant_remove(ctx, all).await? {
                    println!("removed {name}");
                }
            }
        },
        NetworkAction::Fund { node, amount } => {
            let hash = network::fund(ctx, &node, &amount).await?;
            let chain_id = ctx.load_environment()?.chain_id;
            println!("{}", explorer_link(chain_id, hash));
        }
        NetworkAction::List => {
            print!("{}", network::format_rows(&network::list(ctx).await?));
        }
    }
    Ok(())
}
