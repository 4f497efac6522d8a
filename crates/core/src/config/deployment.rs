//! Deployment file schema: endpoint, contract, bounds and collateral routes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::bot::RetryPolicy;

/// Full deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Deployment metadata
    pub deployment: DeploymentDetails,
    /// Liquidation bounds
    pub liquidation: LiquidationBounds,
    /// Collateral token address -> route
    #[serde(default)]
    pub collaterals: BTreeMap<String, CollateralEntry>,
    /// Bot configuration overrides
    #[serde(default)]
    pub bot: Option<BotConfigOverrides>,
}

/// Deployment details. String fields may contain `${VAR}` references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentDetails {
    /// Deployment name (e.g., "optimism-mainnet")
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub subgraph_url: String,
    pub liquidator_contract: String,
}

/// Bounds passed to every liquidation, as decimal strings in settlement
/// token units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationBounds {
    pub max_settlement_token_spent: String,
    pub min_settlement_token_profit: String,
}

/// Route entry for one collateral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollateralEntry {
    /// Uniswap V3 hop path ending in the settlement token.
    DirectSwap { hops: Vec<HopEntry> },
    /// Uniswap flash liquidity plus a stable pool swap.
    PooledSwap {
        uni_pool: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stable_pool: Option<StablePoolEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopEntry {
    pub token_in: String,
    pub fee: u32,
    pub token_out: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StablePoolEntry {
    pub factory: String,
    pub pool: String,
}

/// Bot configuration overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfigOverrides {
    /// Base profile the overrides apply to
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub scanner: Option<ScannerOverrides>,
    #[serde(default)]
    pub timeouts: Option<TimeoutOverrides>,
    #[serde(default)]
    pub submission: Option<SubmissionOverrides>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannerOverrides {
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub discovery_retry_ms: Option<u64>,
    #[serde(default)]
    pub cycle_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutOverrides {
    #[serde(default)]
    pub call_secs: Option<u64>,
    #[serde(default)]
    pub send_secs: Option<u64>,
    #[serde(default)]
    pub receipt_secs: Option<u64>,
    #[serde(default)]
    pub index_request_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionOverrides {
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

impl DeploymentConfig {
    /// Load deployment config from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deployment() {
        let config = DeploymentConfig::from_toml(
            r#"
            [deployment]
            name = "optimism-mainnet"
            chain_id = 10
            rpc_url = "${RPC_URL}"
            subgraph_url = "https://example.com/subgraph"
            liquidator_contract = "0x0000000000000000000000000000000000000001"

            [liquidation]
            max_settlement_token_spent = "100"
            min_settlement_token_profit = "0"

            [collaterals.0x4200000000000000000000000000000000000006]
            kind = "direct_swap"
            hops = [
                { token_in = "0x4200000000000000000000000000000000000006", fee = 3000, token_out = "0x7F5c764cBc14f9669B88837ca1490cCa17c31607" },
            ]

            [collaterals.0x68f180fcCe6836688e9084f035309E29Bf0A2095]
            kind = "pooled_swap"
            uni_pool = "0x0000000000000000000000000000000000000002"

            [bot]
            profile = "conservative"
            scanner = { batch_size = 10 }
            "#,
        )
        .unwrap();

        assert_eq!(config.deployment.chain_id, 10);
        assert_eq!(config.collaterals.len(), 2);
        assert!(matches!(
            config.collaterals.get("0x68f180fcCe6836688e9084f035309E29Bf0A2095"),
            Some(CollateralEntry::PooledSwap {
                stable_pool: None,
                ..
            })
        ));

        let bot = config.bot.unwrap();
        assert_eq!(bot.profile.as_deref(), Some("conservative"));
        assert_eq!(bot.scanner.unwrap().batch_size, Some(10));
    }

    #[test]
    fn test_unknown_route_kind_rejected() {
        let result = DeploymentConfig::from_toml(
            r#"
            [deployment]
            name = "x"
            chain_id = 10
            rpc_url = "http://localhost:8545"
            subgraph_url = "http://localhost:8000"
            liquidator_contract = "0x0000000000000000000000000000000000000001"

            [liquidation]
            max_settlement_token_spent = "1"
            min_settlement_token_profit = "0"

            [collaterals.0x4200000000000000000000000000000000000006]
            kind = "teleport"
            "#,
        );
        assert!(result.is_err());
    }
}
