//! Liquidator chain interaction layer.
//!
//! This crate provides:
//! - Contract bindings for the perp liquidator, vault and ERC-20 metadata
//! - [`RiskOracle`] and [`LiquidationExecutor`] capabilities and their
//!   on-chain implementation, [`LiquidatorContract`]
//! - Nonce-safe, serialized transaction submission
//! - Provider management for connectivity checks and balance reads

pub mod contracts;
mod executor;
mod provider;
mod signer;

pub use contracts::{abi_hop, LiquidationCall, LiquidatorContract, SettlementToken};
pub use executor::{ChainError, LiquidationExecutor, ReceiptStatus, RiskOracle, StablePool};
pub use provider::ProviderManager;
pub use signer::{SubmissionSerializer, TransactionSender, TransactionSenderBuilder};
