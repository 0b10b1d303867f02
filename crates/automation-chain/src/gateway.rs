//! The deployer: one signing account bound to one chain.
//!
//! Stateless apart from the signer. Every call that needs a nonce fetches
//! a fresh one, so sequential calls produce strictly increasing nonces.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{Address, Bytes, TxHash, U256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{EvmClient, TxOptions, TxReceipt};
use crate::error::{ChainError, ChainResult};
use crate::explorer::explorer_link;
use crate::keys::parse_private_key;

/// Tunables for transaction construction and receipt polling.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub chain_id: u64,
    pub gas_limit: u64,
    pub gas_premium_percent: u64,
    pub poll_interval: Duration,
}

impl GatewayConfig {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            gas_limit: 6_500_000,
            gas_premium_percent: 20,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Suggested gas price plus `percent` of itself (integer arithmetic).
pub fn boosted_gas_price(suggested: u128, percent: u64) -> u128 {
    suggested.saturating_add(suggested.saturating_mul(percent as u128) / 100)
}

/// Race `fut` against `cancel`.
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = ChainResult<T>>,
) -> ChainResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ChainError::Cancelled),
        result = fut => result,
    }
}

/// Signs and submits transactions for one account.
#[derive(Clone)]
pub struct Deployer {
    client: Arc<dyn EvmClient>,
    signer: PrivateKeySigner,
    address: Address,
    config: GatewayConfig,
}

impl std::fmt::Debug for Deployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployer")
            .field("address", &self.address)
            .field("config", &self.config)
            .finish()
    }
}

impl Deployer {
    /// Bind `private_key` (hex) to `client`. The address is derived once here.
    pub fn new(
        client: Arc<dyn EvmClient>,
        private_key: &str,
        config: GatewayConfig,
    ) -> ChainResult<Self> {
        let signer = parse_private_key(private_key)?;
        let address = signer.address();
        Ok(Self {
            client,
            signer,
            address,
            config,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    pub fn client(&self) -> &Arc<dyn EvmClient> {
        &self.client
    }

    /// Fresh nonce, boosted gas price and the configured gas limit.
    pub async fn build_tx_options(&self, cancel: &CancellationToken) -> ChainResult<TxOptions> {
        let nonce = cancellable(cancel, self.client.pending_nonce(self.address))
            .await
            .map_err(|e| wrap_interaction("pending nonce", e))?;
        let suggested = cancellable(cancel, self.client.suggest_gas_price())
            .await
            .map_err(|e| wrap_interaction("suggest gas price", e))?;
        let gas_price = boosted_gas_price(suggested, self.config.gas_premium_percent);
        debug!(nonce, suggested, gas_price, "built transaction options");

        Ok(TxOptions {
            from: self.address,
            nonce,
            gas_price,
            gas_limit: self.config.gas_limit,
            chain_id: self.config.chain_id,
            value: U256::ZERO,
            signer: self.signer.clone(),
        })
    }

    /// Broadcast a signed transaction built from `opts`.
    pub async fn submit(
        &self,
        cancel: &CancellationToken,
        opts: &TxOptions,
        to: Option<Address>,
        input: Bytes,
    ) -> ChainResult<TxHash> {
        let hash = cancellable(cancel, self.client.send_transaction(opts, to, input)).await?;
        debug!(%hash, nonce = opts.nonce, "transaction submitted");
        Ok(hash)
    }

    /// Block until `hash` is included. A reverted transaction fails with an
    /// explorer link.
    pub async fn wait_mined(
        &self,
        cancel: &CancellationToken,
        hash: TxHash,
    ) -> ChainResult<TxReceipt> {
        loop {
            if let Some(receipt) = cancellable(cancel, self.client.receipt(hash)).await? {
                if !receipt.success {
                    return Err(ChainError::ChainTransaction {
                        hash: hash.to_string(),
                        link: explorer_link(self.config.chain_id, hash),
                    });
                }
                debug!(%hash, block = ?receipt.block_number, "transaction mined");
                return Ok(receipt);
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ChainError::Cancelled),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// [`Self::wait_mined`] for a contract creation, returning the new address.
    pub async fn wait_deployed(
        &self,
        cancel: &CancellationToken,
        hash: TxHash,
    ) -> ChainResult<Address> {
        let receipt = self.wait_mined(cancel, hash).await?;
        receipt.contract_address.ok_or_else(|| ChainError::ChainTransaction {
            hash: hash.to_string(),
            link: explorer_link(self.config.chain_id, hash),
        })
    }

    /// Call `to` with `input` and wait for inclusion.
    pub async fn transact(
        &self,
        cancel: &CancellationToken,
        to: Address,
        input: Bytes,
    ) -> ChainResult<TxReceipt> {
        let opts = self.build_tx_options(cancel).await?;
        let hash = self.submit(cancel, &opts, Some(to), input).await?;
        self.wait_mined(cancel, hash).await
    }

    /// Create a contract from `init_code` and wait for its address.
    pub async fn deploy_code(
        &self,
        cancel: &CancellationToken,
        init_code: Bytes,
    ) -> ChainResult<Address> {
        let opts = self.build_tx_options(cancel).await?;
        let hash = self.submit(cancel, &opts, None, init_code).await?;
        self.wait_deployed(cancel, hash).await
    }

    /// One-shot native value transfer.
    pub async fn send_native(
        &self,
        cancel: &CancellationToken,
        to: Address,
        amount: U256,
    ) -> ChainResult<TxReceipt> {
        let opts = self.build_tx_options(cancel).await?.with_value(amount);
        let hash = self.submit(cancel, &opts, Some(to), Bytes::new()).await?;
        let receipt = self.wait_mined(cancel, hash).await?;
        info!(%to, %amount, %hash, "sent native funds");
        Ok(receipt)
    }

    pub async fn call(
        &self,
        cancel: &CancellationToken,
        to: Address,
        input: Bytes,
    ) -> ChainResult<Bytes> {
        cancellable(cancel, self.client.call(to, input)).await
    }

    pub async fn code_at(&self, cancel: &CancellationToken, address: Address) -> ChainResult<Bytes> {
        cancellable(cancel, self.client.code_at(address)).await
    }

    pub async fn balance(&self, cancel: &CancellationToken, address: Address) -> ChainResult<U256> {
        cancellable(cancel, self.client.balance(address)).await
    }
}

fn wrap_interaction(what: &str, err: ChainError) -> ChainError {
    match err {
        ChainError::Cancelled => ChainError::Cancelled,
        ChainError::ClientInteraction(reason) => {
            ChainError::ClientInteraction(format!("{what}: {reason}"))
        }
        other => ChainError::ClientInteraction(format!("{what}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeChain;

    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn deployer(chain: &FakeChain, chain_id: u64) -> Deployer {
        let mut config = GatewayConfig::new(chain_id);
        config.poll_interval = Duration::from_millis(1);
        Deployer::new(Arc::new(chain.clone()), DEV_KEY, config).unwrap()
    }

    #[test]
    fn boost_is_a_fifth_at_twenty_percent() {
        for p in [0u128, 1, 4, 5, 99, 1_000_000_007, 30_000_000_000] {
            assert_eq!(boosted_gas_price(p, 20), p + p / 5);
        }
        assert_eq!(boosted_gas_price(100, 0), 100);
        assert_eq!(boosted_gas_price(100, 50), 150);
    }

    #[tokio::test]
    async fn options_carry_nonce_premium_and_limit() {
        let chain = FakeChain::new(31337);
        chain.set_gas_price(10_000_000_000);
        let d = deployer(&chain, 31337);
        chain.set_nonce(d.address(), 7);

        let opts = d.build_tx_options(&CancellationToken::new()).await.unwrap();
        assert_eq!(opts.nonce, 7);
        assert_eq!(opts.gas_price, 12_000_000_000);
        assert_eq!(opts.gas_limit, 6_500_000);
        assert_eq!(opts.chain_id, 31337);
        assert_eq!(opts.from, d.address());
    }

    #[tokio::test]
    async fn unreachable_client_is_interaction_error() {
        let chain = FakeChain::new(1);
        chain.set_unreachable(true);
        let d = deployer(&chain, 1);
        let err = d.build_tx_options(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ChainError::ClientInteraction(_)));
    }

    #[tokio::test]
    async fn sequential_deploys_use_increasing_nonces() {
        let chain = FakeChain::new(31337);
        let d = deployer(&chain, 31337);
        let cancel = CancellationToken::new();

        let first = d.deploy_code(&cancel, Bytes::from_static(&[0x60, 0x01])).await.unwrap();
        let second = d.deploy_code(&cancel, Bytes::from_static(&[0x60, 0x02])).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(first, d.address().create(0));
        assert_eq!(second, d.address().create(1));

        let nonces: Vec<u64> = chain.sent().iter().map(|tx| tx.nonce).collect();
        assert_eq!(nonces, vec![0, 1]);
    }

    #[tokio::test]
    async fn reverted_transaction_links_to_explorer() {
        let chain = FakeChain::new(1);
        chain.revert_selector([0xde, 0xad, 0xbe, 0xef]);
        let d = deployer(&chain, 1);

        let err = d
            .transact(
                &CancellationToken::new(),
                Address::repeat_byte(1),
                Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
            )
            .await
            .unwrap_err();
        match err {
            ChainError::ChainTransaction { hash, link } => {
                assert_eq!(link, format!("https://etherscan.io/tx/{hash}"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn reverted_transaction_on_local_chain_is_bare_hash() {
        let chain = FakeChain::new(31337);
        chain.fail_deploys_after(0);
        let d = deployer(&chain, 31337);

        let err = d
            .deploy_code(&CancellationToken::new(), Bytes::from_static(&[0x00]))
            .await
            .unwrap_err();
        match err {
            ChainError::ChainTransaction { hash, link } => assert_eq!(hash, link),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn send_native_moves_value() {
        let chain = FakeChain::new(31337);
        let d = deployer(&chain, 31337);
        chain.set_balance(d.address(), U256::from(1_000u64));
        let to = Address::repeat_byte(0x42);

        d.send_native(&CancellationToken::new(), to, U256::from(250u64))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        assert_eq!(d.balance(&cancel, to).await.unwrap(), U256::from(250u64));
        assert_eq!(d.balance(&cancel, d.address()).await.unwrap(), U256::from(750u64));
        assert_eq!(chain.sent()[0].value, U256::from(250u64));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let chain = FakeChain::new(31337);
        let d = deployer(&chain, 31337);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = d.build_tx_options(&cancel).await.unwrap_err();
        assert!(matches!(err, ChainError::Cancelled));
        assert!(chain.sent().is_empty());
    }
}
