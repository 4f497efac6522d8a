//! Deployment loader that resolves and validates the deployment file.
//!
//! This module provides a single entry point for loading all configuration
//! needed to run the liquidation bot. Presence and format are checked here;
//! the liquidation bounds are parsed later, once the settlement token's
//! decimals are known.

use super::{
    BotConfig, BotConfigOverrides, CollateralEntry, DeploymentConfig, HopEntry, StablePoolEntry,
};
use crate::paths::{CollateralPath, Hop, HopList, SwapPathRegistry};
use crate::units::{parse_signed_units, parse_units, UnitsError};
use alloy::primitives::{aliases::U24, Address, I256, U256};
use anyhow::{Context, Result};
use liquidator_chain::StablePool;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Default deployment file when `DEPLOYMENT_CONFIG` is unset.
pub const DEFAULT_DEPLOYMENT_PATH: &str = "config/optimism.toml";

/// Invalid deployment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field}: invalid address {value:?}")]
    InvalidAddress { field: String, value: String },

    #[error("{field}: unresolved environment reference in {value:?}")]
    UnresolvedEnv { field: String, value: String },

    #[error("collateral {collateral}: fee {fee} does not fit in uint24")]
    FeeOutOfRange { collateral: Address, fee: u32 },

    #[error("collateral {collateral}: direct swap has no hops")]
    EmptyPath { collateral: Address },

    #[error("collateral {collateral}: first hop starts at {token_in}, not at the collateral")]
    HeadMismatch { collateral: Address, token_in: Address },

    #[error("collateral {collateral}: hop {index} starts at {found}, previous hop ends at {expected}")]
    BrokenHopChain {
        collateral: Address,
        index: usize,
        expected: Address,
        found: Address,
    },

    #[error("collateral {collateral} is configured twice")]
    DuplicateCollateral { collateral: Address },

    #[error("no collaterals configured")]
    EmptyRegistry,

    #[error("{name}: {source}")]
    InvalidBound {
        name: &'static str,
        #[source]
        source: UnitsError,
    },
}

/// Bounds as configured, before the settlement token's decimals are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBounds {
    pub max_settlement_token_spent: String,
    pub min_settlement_token_profit: String,
}

/// Bounds in settlement token base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationLimits {
    pub max_settlement_token_spent: U256,
    /// Signed: zero or negative values are valid overrides.
    pub min_settlement_token_profit: I256,
}

impl RawBounds {
    /// Parse both bounds at `decimals` precision.
    pub fn resolve(&self, decimals: u8) -> Result<LiquidationLimits, ConfigError> {
        let max_settlement_token_spent = parse_units(&self.max_settlement_token_spent, decimals)
            .map_err(|source| ConfigError::InvalidBound {
                name: "max_settlement_token_spent",
                source,
            })?;
        let min_settlement_token_profit =
            parse_signed_units(&self.min_settlement_token_profit, decimals).map_err(|source| {
                ConfigError::InvalidBound {
                    name: "min_settlement_token_profit",
                    source,
                }
            })?;
        Ok(LiquidationLimits {
            max_settlement_token_spent,
            min_settlement_token_profit,
        })
    }
}

/// Fully resolved deployment configuration.
#[derive(Debug, Clone)]
pub struct ResolvedDeployment {
    /// Deployment name
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub subgraph_url: String,
    /// Liquidator contract address
    pub liquidator: Address,
    pub bounds: RawBounds,
    pub registry: SwapPathRegistry,
    /// Bot configuration (with deployment overrides applied)
    pub bot: BotConfig,
}

/// Deployment loader with a pluggable environment.
pub struct DeploymentLoader<E> {
    env: E,
}

impl DeploymentLoader<fn(&str) -> Option<String>> {
    /// Loader reading the process environment.
    pub fn from_process_env() -> Self {
        fn lookup(name: &str) -> Option<String> {
            std::env::var(name).ok()
        }
        Self { env: lookup }
    }
}

impl<E> DeploymentLoader<E>
where
    E: Fn(&str) -> Option<String>,
{
    pub fn new(env: E) -> Self {
        Self { env }
    }

    /// Load and resolve the deployment file at `path`.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<ResolvedDeployment> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading deployment configuration");

        let config = DeploymentConfig::from_file(path)
            .with_context(|| format!("Failed to read deployment file {}", path.display()))?;
        self.resolve(config)
            .with_context(|| format!("Invalid deployment file {}", path.display()))
    }

    /// Resolve an already parsed deployment.
    pub fn resolve(&self, config: DeploymentConfig) -> Result<ResolvedDeployment> {
        let details = &config.deployment;

        let rpc_url = self.expand_required("deployment.rpc_url", &details.rpc_url)?;
        let subgraph_url = self.expand_required("deployment.subgraph_url", &details.subgraph_url)?;
        let liquidator_str =
            self.expand_required("deployment.liquidator_contract", &details.liquidator_contract)?;
        let liquidator = parse_address("deployment.liquidator_contract", &liquidator_str)?;

        let bounds = RawBounds {
            max_settlement_token_spent: (self.env)("MAX_SETTLEMENT_TOKEN_SPENT").unwrap_or_else(
                || self.expand_env(&config.liquidation.max_settlement_token_spent),
            ),
            min_settlement_token_profit: (self.env)("MIN_SETTLEMENT_TOKEN_PROFIT").unwrap_or_else(
                || self.expand_env(&config.liquidation.min_settlement_token_profit),
            ),
        };

        let registry = build_registry(&config.collaterals)?;
        let bot = self.build_bot_config(config.bot.as_ref())?;

        Ok(ResolvedDeployment {
            name: details.name.clone(),
            chain_id: details.chain_id,
            rpc_url,
            subgraph_url,
            liquidator,
            bounds,
            registry,
            bot,
        })
    }

    /// Expand `${VAR_NAME}` patterns with environment values. Unknown
    /// variables are left in place.
    pub fn expand_env(&self, s: &str) -> String {
        let re = env_pattern();
        re.replace_all(s, |caps: &regex_lite::Captures<'_>| {
            (self.env)(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
    }

    fn expand_required(&self, field: &str, value: &str) -> Result<String, ConfigError> {
        let expanded = self.expand_env(value);
        if env_pattern().is_match(&expanded) {
            return Err(ConfigError::UnresolvedEnv {
                field: field.to_string(),
                value: expanded,
            });
        }
        Ok(expanded)
    }

    fn build_bot_config(&self, overrides: Option<&BotConfigOverrides>) -> Result<BotConfig> {
        // Start with base config from profile or environment
        let mut config = match overrides.and_then(|o| o.profile.as_deref()) {
            Some(profile) => BotConfig::from_profile(profile),
            None => BotConfig::from_env()?,
        };

        let Some(ovr) = overrides else {
            return Ok(config);
        };

        if let Some(scanner) = &ovr.scanner {
            if let Some(v) = scanner.batch_size {
                config.scanner.batch_size = v;
            }
            if let Some(v) = scanner.page_size {
                config.scanner.page_size = v;
            }
            if let Some(v) = scanner.discovery_retry_ms {
                config.scanner.discovery_retry_ms = v;
            }
            if let Some(v) = scanner.cycle_interval_ms {
                config.scanner.cycle_interval_ms = v;
            }
        }

        if let Some(timeouts) = &ovr.timeouts {
            if let Some(v) = timeouts.call_secs {
                config.timeouts.call_secs = v;
            }
            if let Some(v) = timeouts.send_secs {
                config.timeouts.send_secs = v;
            }
            if let Some(v) = timeouts.receipt_secs {
                config.timeouts.receipt_secs = v;
            }
            if let Some(v) = timeouts.index_request_secs {
                config.timeouts.index_request_secs = v;
            }
        }

        if let Some(submission) = &ovr.submission {
            if let Some(v) = submission.retry_policy {
                config.submission.retry_policy = v;
            }
            if submission.gas_limit.is_some() {
                config.submission.gas_limit = submission.gas_limit;
            }
        }

        Ok(config)
    }
}

fn env_pattern() -> regex_lite::Regex {
    // Literal pattern; compiling it cannot fail.
    regex_lite::Regex::new(r"\$\{([^}]+)\}").unwrap()
}

fn parse_address(field: &str, value: &str) -> Result<Address, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidAddress {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Validate every collateral entry and build the registry.
pub fn build_registry(
    entries: &BTreeMap<String, CollateralEntry>,
) -> Result<SwapPathRegistry, ConfigError> {
    if entries.is_empty() {
        return Err(ConfigError::EmptyRegistry);
    }

    let mut paths = BTreeMap::new();
    for (key, entry) in entries {
        let collateral = parse_address("collaterals", key)?;
        let path = match entry {
            CollateralEntry::DirectSwap { hops } => resolve_direct(collateral, hops)?,
            CollateralEntry::PooledSwap {
                uni_pool,
                stable_pool,
            } => resolve_pooled(collateral, uni_pool, stable_pool.as_ref())?,
        };
        if paths.insert(collateral, path).is_some() {
            return Err(ConfigError::DuplicateCollateral { collateral });
        }
    }
    Ok(SwapPathRegistry::new(paths))
}

fn resolve_direct(collateral: Address, entries: &[HopEntry]) -> Result<CollateralPath, ConfigError> {
    let field = format!("collaterals.{collateral}.hops");
    let mut hops = HopList::new();
    for entry in entries {
        let fee = U24::try_from(entry.fee).map_err(|_| ConfigError::FeeOutOfRange {
            collateral,
            fee: entry.fee,
        })?;
        hops.push(Hop::new(
            parse_address(&field, &entry.token_in)?,
            fee,
            parse_address(&field, &entry.token_out)?,
        ));
    }

    let head = hops.first().ok_or(ConfigError::EmptyPath { collateral })?;
    if head.token_in != collateral {
        return Err(ConfigError::HeadMismatch {
            collateral,
            token_in: head.token_in,
        });
    }
    for (index, pair) in hops.windows(2).enumerate() {
        if pair[0].token_out != pair[1].token_in {
            return Err(ConfigError::BrokenHopChain {
                collateral,
                index: index + 1,
                expected: pair[0].token_out,
                found: pair[1].token_in,
            });
        }
    }

    CollateralPath::direct(&hops).ok_or(ConfigError::EmptyPath { collateral })
}

fn resolve_pooled(
    collateral: Address,
    uni_pool: &str,
    stable_pool: Option<&StablePoolEntry>,
) -> Result<CollateralPath, ConfigError> {
    let uni_pool = parse_address(&format!("collaterals.{collateral}.uni_pool"), uni_pool)?;
    let stable_pool = match stable_pool {
        Some(entry) => {
            let field = format!("collaterals.{collateral}.stable_pool");
            StablePool::from_lookup(
                parse_address(&field, &entry.factory)?,
                parse_address(&field, &entry.pool)?,
            )
        }
        None => None,
    };
    Ok(CollateralPath::PooledSwap {
        uni_pool,
        stable_pool,
    })
}

/// Collaterals whose direct route does not end in `settlement_token`.
///
/// Such routes cannot repay the flash swap; they are warned about, not
/// rejected, since the oracle may never pick them.
pub fn check_settlement_routes(registry: &SwapPathRegistry, settlement_token: Address) -> Vec<Address> {
    let mismatched: Vec<Address> = registry
        .iter()
        .filter(|(_, path)| matches!(path.final_token(), Some(token) if token != settlement_token))
        .map(|(collateral, _)| *collateral)
        .collect();

    for collateral in &mismatched {
        warn!(
            collateral = %collateral,
            settlement_token = %settlement_token,
            "Route does not end in the settlement token"
        );
    }
    mismatched
}

/// Load the deployment named by `DEPLOYMENT_CONFIG` (or the default path).
pub fn load_deployment_from_env() -> Result<ResolvedDeployment> {
    let path =
        std::env::var("DEPLOYMENT_CONFIG").unwrap_or_else(|_| DEFAULT_DEPLOYMENT_PATH.to_string());
    DeploymentLoader::from_process_env().load(path)
}
