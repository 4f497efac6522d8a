//! Configuration system for the liquidation bot.
//!
//! This module provides:
//! - Bot runtime configuration (profiles, batching, timeouts, retry policy)
//! - Deployment configuration (endpoints, contract, bounds, collateral routes)
//! - The loader that expands `${VAR}` references and validates routes

mod bot;
mod deployment;
mod loader;

// Re-export bot config (main runtime config)
pub use bot::{BotConfig, RetryPolicy, ScannerConfig, SubmissionConfig, TimeoutConfig};

// Re-export deployment config
pub use deployment::{
    BotConfigOverrides, CollateralEntry, DeploymentConfig, DeploymentDetails, HopEntry,
    LiquidationBounds, ScannerOverrides, StablePoolEntry, SubmissionOverrides, TimeoutOverrides,
};

// Re-export deployment loader
pub use loader::{
    build_registry, check_settlement_routes, load_deployment_from_env, ConfigError,
    DeploymentLoader, LiquidationLimits, RawBounds, ResolvedDeployment, DEFAULT_DEPLOYMENT_PATH,
};
