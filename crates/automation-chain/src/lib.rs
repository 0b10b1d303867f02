//! Narrow facade over an EVM JSON-RPC client.
//!
//! The rest of the workspace only ever sees [`EvmClient`] and the
//! [`Deployer`] built on top of it:
//!
//! ```text
//! Deployer
//!   ├── build_tx_options()  pending nonce + boosted gas price + signer
//!   ├── submit()            sign and broadcast
//!   ├── wait_mined()        poll for a receipt, fail with an explorer link
//!   ├── wait_deployed()     same, returning the created address
//!   └── send_native()       plain value transfer
//! ```
//!
//! [`RpcClient`] speaks to a real node through alloy; [`FakeChain`] is an
//! in-memory chain for tests.

pub mod amount;
pub mod client;
pub mod error;
pub mod explorer;
pub mod fake;
pub mod gateway;
pub mod keys;
pub mod rpc;

pub use alloy_primitives::{Address, Bytes, TxHash, U256};
pub use amount::parse_exp;
pub use client::{ChainFuture, EvmClient, TxOptions, TxReceipt};
pub use error::{ChainError, ChainResult};
pub use explorer::explorer_link;
pub use fake::FakeChain;
pub use gateway::{boosted_gas_price, Deployer, GatewayConfig};
pub use rpc::RpcClient;
