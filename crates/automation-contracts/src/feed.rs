//! Mock price feeds (LINK/ETH and fast gas).

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, I256, U256};
use alloy_sol_types::{SolType, sol_data};
use tokio_util::sync::CancellationToken;

use crate::catalog::Catalog;
use crate::error::{ContractError, ContractResult};

pub const ARTIFACT: &str = "MockV3Aggregator";

/// Which of the two feeds the registry reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    LinkEth,
    FastGas,
}

impl FeedKind {
    pub fn label(self) -> &'static str {
        match self {
            FeedKind::LinkEth => "LinkETHFeed",
            FeedKind::FastGas => "FastGasFeed",
        }
    }

    pub fn decimals(self) -> u8 {
        match self {
            FeedKind::LinkEth => 18,
            FeedKind::FastGas => 0,
        }
    }

    /// Answer used when none is given: 0.02 ETH per LINK, 60 gwei.
    pub fn default_answer(self) -> U256 {
        match self {
            FeedKind::LinkEth => U256::from(20_000_000_000_000_000u64),
            FeedKind::FastGas => U256::from(60_000_000_000u64),
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedKind::LinkEth => f.write_str("link-eth"),
            FeedKind::FastGas => f.write_str("fast-gas"),
        }
    }
}

impl FromStr for FeedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "link-eth" => Ok(FeedKind::LinkEth),
            "fast-gas" => Ok(FeedKind::FastGas),
            other => Err(format!("unknown feed: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedDeploy {
    pub kind: FeedKind,
    pub answer: U256,
}

impl FeedDeploy {
    pub fn new(kind: FeedKind, answer: Option<U256>) -> Self {
        Self {
            kind,
            answer: answer.unwrap_or_else(|| kind.default_answer()),
        }
    }
}

pub(crate) fn constructor_args(cfg: &FeedDeploy) -> ContractResult<Vec<u8>> {
    let answer = I256::try_from(cfg.answer).map_err(|e| ContractError::Initialization {
        contract: cfg.kind.label().to_string(),
        reason: format!("answer {} does not fit int256: {e}", cfg.answer),
    })?;
    Ok(<(sol_data::Uint<8>, sol_data::Int<256>) as SolType>::abi_encode_params(&(
        cfg.kind.decimals(),
        answer,
    )))
}

pub(crate) async fn deploy(
    cancel: &CancellationToken,
    catalog: &Catalog,
    cfg: &FeedDeploy,
) -> ContractResult<Address> {
    let args = constructor_args(cfg)?;
    catalog.create(cancel, ARTIFACT, args).await
}
