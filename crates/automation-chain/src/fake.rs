//! In-memory chain for tests.
//!
//! Transactions are "mined" the moment they are sent. Contract creations
//! land at the address derived from `(sender, nonce)` and store their init
//! code as the account code, so `code_at` reports them as deployed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use alloy_primitives::{keccak256, Address, Bytes, TxHash, U256};

use crate::client::{ChainFuture, EvmClient, TxOptions, TxReceipt};
use crate::error::ChainError;

/// A transaction as the fake chain received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTx {
    pub hash: TxHash,
    pub from: Address,
    pub to: Option<Address>,
    pub input: Bytes,
    pub value: U256,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
}

impl SentTx {
    /// First four bytes of the calldata.
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.input.get(..4).and_then(|s| s.try_into().ok())
    }
}

#[derive(Debug, Default)]
struct FakeState {
    nonces: HashMap<Address, u64>,
    gas_price: u128,
    sent: Vec<SentTx>,
    receipts: HashMap<TxHash, TxReceipt>,
    code: HashMap<Address, Bytes>,
    balances: HashMap<Address, U256>,
    call_results: HashMap<(Address, [u8; 4]), Bytes>,
    reverting_selectors: HashSet<[u8; 4]>,
    fail_deploys_after: Option<usize>,
    deploys: usize,
    unreachable: bool,
}

/// Scriptable in-memory [`EvmClient`].
#[derive(Debug, Clone)]
pub struct FakeChain {
    chain_id: u64,
    state: Arc<Mutex<FakeState>>,
}

impl FakeChain {
    pub fn new(chain_id: u64) -> Self {
        let state = FakeState {
            gas_price: 1_000_000_000,
            ..FakeState::default()
        };
        Self {
            chain_id,
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_gas_price(&self, price: u128) {
        self.lock().gas_price = price;
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.lock().nonces.insert(address, nonce);
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.lock().balances.insert(address, balance);
    }

    pub fn set_code(&self, address: Address, code: Bytes) {
        self.lock().code.insert(address, code);
    }

    /// Answer `call(to, selector…)` with `result`.
    pub fn set_call_result(&self, to: Address, selector: [u8; 4], result: Bytes) {
        self.lock().call_results.insert((to, selector), result);
    }

    /// Make every transaction calling `selector` revert.
    pub fn revert_selector(&self, selector: [u8; 4]) {
        self.lock().reverting_selectors.insert(selector);
    }

    /// Let `count` contract creations succeed, then revert the rest.
    pub fn fail_deploys_after(&self, count: usize) {
        self.lock().fail_deploys_after = Some(count);
    }

    /// Make every RPC call fail as if the node were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Every transaction received so far, in order.
    pub fn sent(&self) -> Vec<SentTx> {
        self.lock().sent.clone()
    }

    fn check_reachable(&self) -> Result<(), ChainError> {
        if self.lock().unreachable {
            return Err(ChainError::ClientInteraction("connection refused".to_string()));
        }
        Ok(())
    }

    fn apply(&self, opts: &TxOptions, to: Option<Address>, input: Bytes) -> TxHash {
        let mut state = self.lock();

        let mut preimage = opts.from.to_vec();
        preimage.extend_from_slice(&opts.nonce.to_be_bytes());
        preimage.extend_from_slice(&(state.sent.len() as u64).to_be_bytes());
        let hash = keccak256(&preimage);

        let next = state.nonces.entry(opts.from).or_insert(0);
        *next = (*next).max(opts.nonce + 1);

        let selector: Option<[u8; 4]> = input.get(..4).and_then(|s| s.try_into().ok());
        let reverted = match to {
            Some(_) => selector.is_some_and(|s| state.reverting_selectors.contains(&s)),
            None => state
                .fail_deploys_after
                .is_some_and(|limit| state.deploys >= limit),
        };

        let mut contract_address = None;
        if !reverted {
            match to {
                Some(to) => {
                    if !opts.value.is_zero() {
                        let from_balance = state.balances.entry(opts.from).or_default();
                        *from_balance = from_balance.saturating_sub(opts.value);
                        *state.balances.entry(to).or_default() += opts.value;
                    }
                }
                None => {
                    let created = opts.from.create(opts.nonce);
                    state.code.insert(created, input.clone());
                    contract_address = Some(created);
                }
            }
        }
        if to.is_none() {
            state.deploys += 1;
        }

        state.sent.push(SentTx {
            hash,
            from: opts.from,
            to,
            input,
            value: opts.value,
            nonce: opts.nonce,
            gas_price: opts.gas_price,
            gas_limit: opts.gas_limit,
        });
        let block_number = state.sent.len() as u64;
        state.receipts.insert(
            hash,
            TxReceipt {
                hash,
                success: !reverted,
                contract_address,
                block_number: Some(block_number),
            },
        );
        hash
    }
}

impl EvmClient for FakeChain {
    fn chain_id(&self) -> ChainFuture<'_, u64> {
        Box::pin(async move {
            self.check_reachable()?;
            Ok(self.chain_id)
        })
    }

    fn pending_nonce(&self, address: Address) -> ChainFuture<'_, u64> {
        Box::pin(async move {
            self.check_reachable()?;
            Ok(self.lock().nonces.get(&address).copied().unwrap_or(0))
        })
    }

    fn suggest_gas_price(&self) -> ChainFuture<'_, u128> {
        Box::pin(async move {
            self.check_reachable()?;
            Ok(self.lock().gas_price)
        })
    }

    fn send_transaction<'a>(
        &'a self,
        opts: &'a TxOptions,
        to: Option<Address>,
        input: Bytes,
    ) -> ChainFuture<'a, TxHash> {
        Box::pin(async move {
            self.check_reachable()?;
            Ok(self.apply(opts, to, input))
        })
    }

    fn receipt(&self, hash: TxHash) -> ChainFuture<'_, Option<TxReceipt>> {
        Box::pin(async move {
            self.check_reachable()?;
            Ok(self.lock().receipts.get(&hash).cloned())
        })
    }

    fn call(&self, to: Address, input: Bytes) -> ChainFuture<'_, Bytes> {
        Box::pin(async move {
            self.check_reachable()?;
            let selector: [u8; 4] = input
                .get(..4)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| ChainError::ClientInteraction("calldata too short".to_string()))?;
            self.lock()
                .call_results
                .get(&(to, selector))
                .cloned()
                .ok_or_else(|| ChainError::ClientInteraction("execution reverted".to_string()))
        })
    }

    fn code_at(&self, address: Address) -> ChainFuture<'_, Bytes> {
        Box::pin(async move {
            self.check_reachable()?;
            Ok(self.lock().code.get(&address).cloned().unwrap_or_default())
        })
    }

    fn balance(&self, address: Address) -> ChainFuture<'_, U256> {
        Box::pin(async move {
            self.check_reachable()?;
            Ok(self.lock().balances.get(&address).copied().unwrap_or_default())
        })
    }
}
