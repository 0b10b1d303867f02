//! LINK token: deploy, mint, transfer.

use alloy_primitives::{Address, U256};
use automation_chain::TxReceipt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::abi::ILinkToken;
use crate::catalog::Catalog;
use crate::error::ContractResult;

pub const ARTIFACT: &str = "LinkToken";

pub(crate) async fn deploy(cancel: &CancellationToken, catalog: &Catalog) -> ContractResult<Address> {
    catalog.create(cancel, ARTIFACT, Vec::new()).await
}

/// Grant the deployer the minter role, then mint `amount` juels to `to`.
pub async fn mint(
    cancel: &CancellationToken,
    catalog: &Catalog,
    token: Address,
    to: Address,
    amount: U256,
) -> ContractResult<TxReceipt> {
    let minter = catalog.deployer().address();
    catalog
        .transact(cancel, token, ILinkToken::grantMintRoleCall { minter })
        .await?;
    let receipt = catalog
        .transact(cancel, token, ILinkToken::mintCall { account: to, amount })
        .await?;
    info!(%token, %to, %amount, "minted LINK");
    Ok(receipt)
}

pub async fn transfer(
    cancel: &CancellationToken,
    catalog: &Catalog,
    token: Address,
    to: Address,
    value: U256,
) -> ContractResult<TxReceipt> {
    let receipt = catalog
        .transact(cancel, token, ILinkToken::transferCall { to, value })
        .await?;
    info!(%token, %to, %value, "transferred LINK");
    Ok(receipt)
}

pub async fn balance_of(
    cancel: &CancellationToken,
    catalog: &Catalog,
    token: Address,
    owner: Address,
) -> ContractResult<U256> {
    catalog
        .call(cancel, ARTIFACT, token, ILinkToken::balanceOfCall { owner })
        .await
}
