//! Provider management for the JSON-RPC endpoint.
//! Uses Alloy providers for type-safe RPC interactions.

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::transports::http::reqwest::Url;
use anyhow::{bail, Context, Result};
use tracing::info;

/// Read-only access to the node used at startup.
#[derive(Clone, Debug)]
pub struct ProviderManager {
    url: Url,
}

impl ProviderManager {
    /// Connect to `rpc_url` and verify it serves `expected_chain_id`.
    pub async fn new(rpc_url: &str, expected_chain_id: u64) -> Result<Self> {
        let url: Url = rpc_url
            .parse()
            .with_context(|| format!("invalid rpc url {rpc_url}"))?;

        let provider = ProviderBuilder::new().on_http(url.clone());
        let (block, chain_id) = tokio::try_join!(
            provider.get_block_number(),
            provider.get_chain_id()
        )
        .context("rpc endpoint unreachable")?;

        if chain_id != expected_chain_id {
            bail!("rpc endpoint serves chain {chain_id}, deployment expects {expected_chain_id}");
        }

        info!(block, chain_id, "Provider connection verified");
        Ok(Self { url })
    }

    /// Native balance of `address`.
    pub async fn native_balance(&self, address: Address) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        Ok(provider.get_balance(address).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_malformed_url() {
        let err = ProviderManager::new("not a url", 10).await.unwrap_err();
        assert!(err.to_string().contains("invalid rpc url"));
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_provider_creation() {
        let provider = ProviderManager::new("https://mainnet.optimism.io", 10)
            .await
            .unwrap();
        assert!(provider.native_balance(Address::ZERO).await.is_ok());
    }
}
