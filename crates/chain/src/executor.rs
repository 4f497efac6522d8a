//! Capabilities the bot consumes from the chain.
//!
//! [`RiskOracle`] answers "can this account be liquidated, and with which
//! collateral"; [`LiquidationExecutor`] dry-runs, sends and confirms
//! liquidation calls. Both are implemented by
//! [`LiquidatorContract`](crate::LiquidatorContract) and by test doubles.

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use thiserror::Error;

use crate::contracts::LiquidationCall;

/// JSON-RPC error code for `execution reverted` carrying revert data.
const EXECUTION_REVERTED_CODE: i64 = 3;

/// Error raised by a chain read, dry-run or send.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// The EVM reverted the call.
    #[error("execution reverted: {reason}")]
    Reverted { reason: String },

    /// The node answered with a JSON-RPC error that is not a revert
    /// (nonce too low, rate limited, insufficient funds, ...).
    #[error("rejected by node: {reason}")]
    Rejected { reason: String },

    /// Transport or JSON-RPC failure.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The node answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ChainError {
    /// Human readable reason, suitable for log fields.
    pub fn reason(&self) -> &str {
        match self {
            Self::Reverted { reason } | Self::Rejected { reason } => reason,
            Self::Rpc(reason) | Self::InvalidResponse(reason) => reason,
        }
    }

    /// Whether the EVM itself rejected the call.
    pub fn is_revert(&self) -> bool {
        matches!(self, Self::Reverted { .. })
    }

    /// Classify a JSON-RPC error object by its code and message.
    pub fn from_rpc_error(code: i64, message: &str) -> Self {
        let reason = message.to_string();
        if code == EXECUTION_REVERTED_CODE || message.to_ascii_lowercase().contains("revert") {
            Self::Reverted { reason }
        } else {
            Self::Rejected { reason }
        }
    }
}

impl From<alloy::transports::TransportError> for ChainError {
    fn from(err: alloy::transports::TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => Self::from_rpc_error(payload.code, &payload.message),
            None => Self::Rpc(err.to_string()),
        }
    }
}

impl From<alloy::contract::Error> for ChainError {
    fn from(err: alloy::contract::Error) -> Self {
        match err {
            alloy::contract::Error::TransportError(rpc) => rpc.into(),
            other => Self::InvalidResponse(other.to_string()),
        }
    }
}

/// Stable pool pair returned by the executor's pool lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StablePool {
    pub factory: Address,
    pub pool: Address,
}

impl StablePool {
    /// `(0, 0)` is the executor's "no pool" sentinel.
    pub fn from_lookup(factory: Address, pool: Address) -> Option<Self> {
        if factory.is_zero() && pool.is_zero() {
            None
        } else {
            Some(Self { factory, pool })
        }
    }
}

/// Final status of an included transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Succeeded { block: Option<u64>, gas_used: u64 },
    Reverted { block: Option<u64>, gas_used: u64 },
}

/// Read-only risk checks.
#[async_trait]
pub trait RiskOracle: Send + Sync {
    /// Whether `account` is currently eligible for collateral liquidation.
    async fn is_liquidatable(&self, account: Address) -> Result<bool, ChainError>;

    /// Most profitable collateral among `candidates`, or the zero address.
    async fn max_profitable_collateral(
        &self,
        account: Address,
        candidates: &[Address],
    ) -> Result<Address, ChainError>;
}

/// Liquidation contract operations.
#[async_trait]
pub trait LiquidationExecutor: Send + Sync {
    /// Stable pool able to swap `token_a` into `token_b`, if any.
    async fn resolve_pool(
        &self,
        token_a: Address,
        token_b: Address,
    ) -> Result<Option<StablePool>, ChainError>;

    /// Execute `call` as an `eth_call` from the bot's address.
    async fn simulate(&self, call: &LiquidationCall) -> Result<(), ChainError>;

    /// Sign and broadcast `call` with the given nonce, returning the tx hash.
    async fn send(&self, call: &LiquidationCall, nonce: u64) -> Result<B256, ChainError>;

    /// Wait until `tx_hash` is included and report its status.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<ReceiptStatus, ChainError>;

    /// Pending transaction count of the signing address.
    async fn pending_nonce(&self) -> Result<u64, ChainError>;
}
