//! The EVM client capability consumed by the gateway.
//!
//! Implementations are injected for testability: [`crate::RpcClient`]
//! for a live node, [`crate::FakeChain`] for tests.

use std::future::Future;
use std::pin::Pin;

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{Address, Bytes, TxHash, U256};

use crate::error::ChainResult;

/// Boxed future alias for client calls.
pub type ChainFuture<'a, T> = Pin<Box<dyn Future<Output = ChainResult<T>> + Send + 'a>>;

/// Everything needed to sign one transaction.
#[derive(Debug, Clone)]
pub struct TxOptions {
    pub from: Address,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub chain_id: u64,
    pub value: U256,
    pub signer: PrivateKeySigner,
}

impl TxOptions {
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// The parts of a receipt the gateway cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub hash: TxHash,
    pub success: bool,
    pub contract_address: Option<Address>,
    pub block_number: Option<u64>,
}

/// Narrow view of an EVM JSON-RPC endpoint.
pub trait EvmClient: Send + Sync {
    fn chain_id(&self) -> ChainFuture<'_, u64>;

    fn pending_nonce(&self, address: Address) -> ChainFuture<'_, u64>;

    fn suggest_gas_price(&self) -> ChainFuture<'_, u128>;

    /// Sign with `opts.signer` and broadcast. `to = None` creates a contract
    /// with `input` as init code.
    fn send_transaction<'a>(
        &'a self,
        opts: &'a TxOptions,
        to: Option<Address>,
        input: Bytes,
    ) -> ChainFuture<'a, TxHash>;

    /// Receipt for `hash`, or `None` while it is still pending.
    fn receipt(&self, hash: TxHash) -> ChainFuture<'_, Option<TxReceipt>>;

    /// Read-only call against the latest block.
    fn call(&self, to: Address, input: Bytes) -> ChainFuture<'_, Bytes>;

    fn code_at(&self, address: Address) -> ChainFuture<'_, Bytes>;

    fn balance(&self, address: Address) -> ChainFuture<'_, U256>;
}
