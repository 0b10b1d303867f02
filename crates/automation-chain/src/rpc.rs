//! alloy-backed [`EvmClient`] for a live JSON-RPC endpoint.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy_primitives::{Address, Bytes, TxHash, U256};
use tracing::debug;

use crate::client::{ChainFuture, EvmClient, TxOptions, TxReceipt};
use crate::error::{ChainError, ChainResult};

fn interaction(e: impl std::fmt::Display) -> ChainError {
    ChainError::ClientInteraction(e.to_string())
}

/// JSON-RPC client over HTTP.
#[derive(Clone)]
pub struct RpcClient {
    provider: DynProvider,
    url: String,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient").field("url", &self.url).finish()
    }
}

impl RpcClient {
    /// Build a client for `url`. No request is made until first use.
    pub fn new(url: &str) -> ChainResult<Self> {
        let parsed = url
            .parse()
            .map_err(|e| ChainError::NetworkConnection(format!("{url}: {e}")))?;
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_http(parsed)
            .erased();
        Ok(Self {
            provider,
            url: url.to_string(),
        })
    }

    /// Build a client and verify the endpoint serves `expected_chain_id`.
    pub async fn connect(url: &str, expected_chain_id: u64) -> ChainResult<Self> {
        let client = Self::new(url)?;
        let chain_id = client
            .provider
            .get_chain_id()
            .await
            .map_err(|e| ChainError::NetworkConnection(format!("{url}: {e}")))?;
        if chain_id != expected_chain_id {
            return Err(ChainError::NetworkConnection(format!(
                "{url} serves chain {chain_id}, environment expects {expected_chain_id}"
            )));
        }
        debug!(%url, chain_id, "connected to chain");
        Ok(client)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn sign_and_send(
        &self,
        opts: &TxOptions,
        to: Option<Address>,
        input: Bytes,
    ) -> ChainResult<TxHash> {
        let request = TransactionRequest::default()
            .with_from(opts.from)
            .with_nonce(opts.nonce)
            .with_gas_price(opts.gas_price)
            .with_gas_limit(opts.gas_limit)
            .with_chain_id(opts.chain_id)
            .with_value(opts.value);
        let request = match to {
            Some(to) => request.with_to(to).with_input(input),
            None => request.with_deploy_code(input),
        };

        let wallet = EthereumWallet::from(opts.signer.clone());
        let envelope = request.build(&wallet).await.map_err(interaction)?;
        let pending = self
            .provider
            .send_tx_envelope(envelope)
            .await
            .map_err(interaction)?;
        Ok(*pending.tx_hash())
    }
}

impl EvmClient for RpcClient {
    fn chain_id(&self) -> ChainFuture<'_, u64> {
        Box::pin(async move { self.provider.get_chain_id().await.map_err(interaction) })
    }

    fn pending_nonce(&self, address: Address) -> ChainFuture<'_, u64> {
        Box::pin(async move {
            self.provider
                .get_transaction_count(address)
                .pending()
                .await
                .map_err(interaction)
        })
    }

    fn suggest_gas_price(&self) -> ChainFuture<'_, u128> {
        Box::pin(async move { self.provider.get_gas_price().await.map_err(interaction) })
    }

    fn send_transaction<'a>(
        &'a self,
        opts: &'a TxOptions,
        to: Option<Address>,
        input: Bytes,
    ) -> ChainFuture<'a, TxHash> {
        Box::pin(self.sign_and_send(opts, to, input))
    }

    fn receipt(&self, hash: TxHash) -> ChainFuture<'_, Option<TxReceipt>> {
        Box::pin(async move {
            let receipt = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(interaction)?;
            Ok(receipt.map(|r| TxReceipt {
                hash,
                success: r.status(),
                contract_address: r.contract_address,
                block_number: r.block_number,
            }))
        })
    }

    fn call(&self, to: Address, input: Bytes) -> ChainFuture<'_, Bytes> {
        Box::pin(async move {
            let request = TransactionRequest::default().with_to(to).with_input(input);
            self.provider.call(request).await.map_err(interaction)
        })
    }

    fn code_at(&self, address: Address) -> ChainFuture<'_, Bytes> {
        Box::pin(async move { self.provider.get_code_at(address).await.map_err(interaction) })
    }

    fn balance(&self, address: Address) -> ChainFuture<'_, U256> {
        Box::pin(async move { self.provider.get_balance(address).await.map_err(interaction) })
    }
}
