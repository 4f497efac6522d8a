//! Perp liquidator contract wrapper.
//!
//! [`LiquidatorContract`] reads the vault and settlement token once at
//! connect time and then serves both [`RiskOracle`] and
//! [`LiquidationExecutor`] for the scan loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use liquidator_chain::{LiquidatorContract, TransactionSender};
//!
//! let sender = Arc::new(TransactionSender::new(&key, &rpc_url, 10)?);
//! let contract = LiquidatorContract::connect(&rpc_url, address, sender).await?;
//! println!("settles in {}", contract.settlement_token().symbol);
//! ```

pub mod bindings;
mod calls;

pub use bindings::{IERC20Metadata, IPerpLiquidator, IVault};
pub use calls::{abi_hop, LiquidationCall};

use std::sync::Arc;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::http::reqwest::Url;
use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::executor::{ChainError, LiquidationExecutor, ReceiptStatus, RiskOracle, StablePool};
use crate::signer::TransactionSender;

/// Settlement token metadata read from the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementToken {
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

/// Liquidator contract wrapper with transaction sending capability.
pub struct LiquidatorContract {
    /// Contract address
    pub address: Address,
    vault: Address,
    settlement_token: SettlementToken,
    url: Url,
    sender: Arc<TransactionSender>,
}

impl LiquidatorContract {
    /// Resolve the vault and settlement token behind `address`.
    pub async fn connect(
        rpc_url: &str,
        address: Address,
        sender: Arc<TransactionSender>,
    ) -> anyhow::Result<Self> {
        let url: Url = rpc_url
            .parse()
            .with_context(|| format!("invalid rpc url {rpc_url}"))?;
        let provider = ProviderBuilder::new().on_http(url.clone());

        let liquidator = IPerpLiquidator::new(address, &provider);
        let vault = liquidator
            .getVault()
            .call()
            .await
            .context("Liquidator.getVault() failed")?
            ._0;

        let settlement = IVault::new(vault, &provider)
            .getSettlementToken()
            .call()
            .await
            .context("Vault.getSettlementToken() failed")?
            ._0;

        let token = IERC20Metadata::new(settlement, &provider);
        let decimals_call = token.decimals();
        let symbol_call = token.symbol();
        let (decimals, symbol) = tokio::join!(decimals_call.call(), symbol_call.call());
        let decimals = decimals.context("settlement token decimals() failed")?._0;
        // Symbol is informational; some tokens return bytes32.
        let symbol = symbol.map(|s| s._0).unwrap_or_else(|_| "UNKNOWN".to_string());

        let settlement_token = SettlementToken {
            address: settlement,
            decimals,
            symbol,
        };

        info!(
            contract = %address,
            vault = %vault,
            settlement_token = %settlement_token.address,
            decimals = settlement_token.decimals,
            symbol = %settlement_token.symbol,
            "Liquidator contract connected"
        );

        Ok(Self {
            address,
            vault,
            settlement_token,
            url,
            sender,
        })
    }

    pub fn vault(&self) -> Address {
        self.vault
    }

    pub fn settlement_token(&self) -> &SettlementToken {
        &self.settlement_token
    }

    /// Settlement token held by the liquidator contract, in base units.
    pub async fn settlement_token_balance(&self) -> Result<U256, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let balance = IERC20Metadata::new(self.settlement_token.address, &provider)
            .balanceOf(self.address)
            .call()
            .await?
            ._0;
        Ok(balance)
    }
}

#[async_trait]
impl RiskOracle for LiquidatorContract {
    async fn is_liquidatable(&self, account: Address) -> Result<bool, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let liquidatable = IVault::new(self.vault, &provider)
            .isLiquidatable(account)
            .call()
            .await?
            ._0;
        Ok(liquidatable)
    }

    async fn max_profitable_collateral(
        &self,
        account: Address,
        candidates: &[Address],
    ) -> Result<Address, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let collateral = IPerpLiquidator::new(self.address, &provider)
            .getMaxProfitableCollateralFromCollaterals(account, candidates.to_vec())
            .call()
            .await?
            ._0;
        Ok(collateral)
    }
}

#[async_trait]
impl LiquidationExecutor for LiquidatorContract {
    async fn resolve_pool(
        &self,
        token_a: Address,
        token_b: Address,
    ) -> Result<Option<StablePool>, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let found = IPerpLiquidator::new(self.address, &provider)
            .findCurveFactoryAndPoolForCoins(token_a, token_b)
            .call()
            .await?;
        Ok(StablePool::from_lookup(found._0, found._1))
    }

    async fn simulate(&self, call: &LiquidationCall) -> Result<(), ChainError> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let tx = TransactionRequest::default()
            .with_from(self.sender.address)
            .with_to(self.address)
            .with_input(call.encode());

        provider.call(tx).await?;
        debug!(
            account = %call.trader(),
            method = call.method_name(),
            "Dry-run passed"
        );
        Ok(())
    }

    async fn send(&self, call: &LiquidationCall, nonce: u64) -> Result<B256, ChainError> {
        self.sender
            .send_calldata(self.address, call.encode(), nonce)
            .await
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<ReceiptStatus, ChainError> {
        self.sender.wait_for_receipt(tx_hash).await
    }

    async fn pending_nonce(&self) -> Result<u64, ChainError> {
        self.sender.pending_nonce().await
    }
}

impl std::fmt::Debug for LiquidatorContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiquidatorContract")
            .field("address", &self.address)
            .field("vault", &self.vault)
            .field("settlement_token", &self.settlement_token)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_connect_reads_settlement_token() {
        let private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let rpc_url = "https://mainnet.optimism.io";
        let sender = Arc::new(TransactionSender::new(private_key, rpc_url, 10).unwrap());
        let liquidator = std::env::var("LIQUIDATOR_CONTRACT")
            .expect("LIQUIDATOR_CONTRACT")
            .parse()
            .unwrap();

        let contract = LiquidatorContract::connect(rpc_url, liquidator, sender)
            .await
            .unwrap();
        assert_eq!(contract.settlement_token().decimals, 6);
    }
}
