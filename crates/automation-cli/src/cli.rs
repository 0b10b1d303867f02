//! Command-line surface.

use std::path::PathBuf;

use alloy_primitives::Address;
use automation_contracts::FeedKind;
use automation_core::{RegistryMode, VerifiableLoadType};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "automation-cli",
    about = "Provision an automation oracle network: contracts, nodes and their configuration",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options accepted by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Directory holding the key vault and every environment.
    #[arg(
        long,
        global = true,
        env = "AUTOMATION_STATE_DIRECTORY",
        default_value = "~/.automation-cli"
    )]
    pub state_directory: String,

    /// Environment to operate on.
    #[arg(long, global = true, env = "AUTOMATION_ENVIRONMENT", default_value = "default")]
    pub environment: String,

    /// Key alias overriding the environment's default. Empty means the default.
    #[arg(long, global = true, env = "AUTOMATION_KEY", default_value = "")]
    pub key: String,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create, inspect and edit environments.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage the key vault.
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Deploy and configure contracts.
    Contract {
        #[command(subcommand)]
        target: ContractTarget,
    },
    /// Run and fund the node network.
    Network {
        #[command(subcommand)]
        action: NetworkAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create or update the environment; prompts for anything not given.
    Setup {
        #[arg(long)]
        chain_id: Option<u64>,
        #[arg(long)]
        http_url: Option<String>,
        #[arg(long)]
        ws_url: Option<String>,
        #[arg(long)]
        key_alias: Option<String>,
    },
    /// Remove the environment directory. Running containers are left alone.
    Delete,
    /// Set a field by dotted path, e.g. `registry.ocr.delta-progress 5s`.
    Set { key: String, value: String },
    /// Print a field by dotted path.
    Get { key: String },
}

#[derive(Subcommand, Debug)]
pub enum KeyAction {
    /// Generate a fresh key.
    Create { name: String },
    /// Store a hex private key read from stdin.
    Store { name: String },
    /// Print every alias and address.
    List,
    /// Delete a key; `name*` deletes every alias with that prefix.
    Delete { name: String },
    /// Import every key from a ganache accounts file.
    ImportGanache { file: PathBuf },
    /// Import V3 keystores from a file or every file in a directory.
    ImportGeth {
        name: String,
        path: PathBuf,
        /// File holding the keystore password.
        #[arg(long)]
        password: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ContractTarget {
    /// LINK token and price feeds.
    Link {
        #[command(subcommand)]
        action: LinkAction,
    },
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },
    Registrar {
        #[command(subcommand)]
        action: RegistrarAction,
    },
    /// Load-testing upkeep contracts.
    VerifiableLoad {
        #[command(subcommand)]
        action: VerifiableLoadAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum LinkAction {
    DeployToken,
    /// Mint LINK to the deployer (decimal or `MeN`).
    Mint { amount: String },
    SetTokenAddress { address: Address },
    /// Deploy a mock aggregator.
    DeployFeed {
        /// `link-eth` or `fast-gas`.
        kind: FeedKind,
        #[arg(long)]
        answer: Option<String>,
    },
    SetLinkEthFeedAddress { address: Address },
    SetFastGasFeedAddress { address: Address },
}

#[derive(Subcommand, Debug)]
pub enum RegistryAction {
    Deploy {
        /// DEFAULT, ARBITRUM or OPTIMISM.
        #[arg(long, default_value = "DEFAULT")]
        mode: RegistryMode,
    },
    SetAddress { address: Address },
    /// Push the participants' keys and the environment's configuration on-chain.
    SetConfig {
        #[arg(long)]
        max_faulty: Option<u8>,
    },
}

#[derive(Subcommand, Debug)]
pub enum RegistrarAction {
    Deploy,
    SetAddress { address: Address },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct LoadType {
    /// `conditional` or `log-trigger`.
    #[arg(long = "type", default_value = "conditional")]
    pub kind: VerifiableLoadType,
}

#[derive(Subcommand, Debug)]
pub enum VerifiableLoadAction {
    Deploy {
        #[command(flatten)]
        load: LoadType,
    },
    SetAddress {
        address: Address,
        #[command(flatten)]
        load: LoadType,
    },
    RegisterUpkeeps {
        #[command(flatten)]
        load: LoadType,
        #[arg(long, default_value_t = 5)]
        count: u32,
        /// Blocks between performs.
        #[arg(long, default_value_t = 15)]
        interval: u32,
        /// LINK funding per upkeep (decimal or `MeN` juels).
        #[arg(long, default_value = "1e18")]
        amount: String,
        #[arg(long, default_value_t = 500_000)]
        gas_limit: u32,
        /// Transfer the funding from the deployer to the contract first.
        #[arg(long)]
        send_link: bool,
        /// Cancel the contract's active upkeeps first.
        #[arg(long)]
        cancel_upkeeps: bool,
    },
    CancelUpkeeps {
        #[command(flatten)]
        load: LoadType,
    },
    GetStats {
        #[command(flatten)]
        load: LoadType,
    },
}

#[derive(Subcommand, Debug)]
pub enum NetworkAction {
    Bootstrap {
        #[command(subcommand)]
        action: BootstrapAction,
    },
    Participant {
        #[command(subcommand)]
        action: ParticipantAction,
    },
    /// Send native currency to a node's account.
    Fund {
        /// `bootstrap`, `participant-<i>` or a bare index.
        node: String,
        amount: String,
    },
    /// Print every node with its URL, address and balance.
    List,
}

#[derive(Subcommand, Debug)]
pub enum BootstrapAction {
    /// Bring up the bootstrap node with `image`.
    Set {
        image: String,
        #[arg(long, default_value = "info")]
        log_level: String,
        /// Recreate existing containers.
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ParticipantAction {
    /// Add and bring up participants.
    Add {
        image: String,
        #[arg(long, default_value_t = 1)]
        count: usize,
        #[arg(long, default_value = "info")]
        log_level: String,
    },
    /// Recreate one participant with `image`, keeping its identity.
    Reset { id: String, image: String },
    /// Remove the last participant, or every participant with `--all`.
    Remove {
        #[arg(long)]
        all: bool,
    },
}
