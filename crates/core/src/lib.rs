//! Liquidator core logic.
//!
//! This crate provides the core liquidation bot functionality:
//! - Deployment and runtime configuration
//! - Collateral swap path registry and path packing
//! - Risk evaluation against the on-chain oracle
//! - Per-account liquidation routing with serialized submission
//! - Scan loop orchestration over discovered accounts

pub mod config;
mod liquidator;
mod paths;
mod risk;
mod scanner;
pub mod units;

#[cfg(test)]
mod test_support;

pub use config::{
    build_registry, check_settlement_routes, load_deployment_from_env, BotConfig, ConfigError,
    DeploymentLoader, LiquidationLimits, ResolvedDeployment, RetryPolicy,
};
pub use liquidator::{LiquidationAttempt, LiquidationOutcome, LiquidationRouter};
pub use paths::{pack_tail, CollateralPath, Hop, HopList, SwapPathRegistry};
pub use risk::{BestCollateral, EvaluationError, RiskEvaluator};
pub use scanner::{CycleReport, ScanLoop};
pub use units::{format_units, parse_signed_units, parse_units, UnitsError};
