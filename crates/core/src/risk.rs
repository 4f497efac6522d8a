//! Risk evaluation against the on-chain oracle.
//!
//! Pass-through reads with a timeout on each call; no caching, so every
//! decision reflects chain state at the moment of the attempt.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use liquidator_chain::{ChainError, RiskOracle};
use thiserror::Error;
use tracing::debug;

use crate::paths::SwapPathRegistry;

/// Failure to evaluate one account.
#[derive(Debug, Clone, Error)]
pub enum EvaluationError {
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Oracle answer for the most profitable collateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BestCollateral {
    /// Zero-address sentinel: nothing worth liquidating.
    None,
    Registered(Address),
    /// The oracle named a token outside the candidate list.
    Unregistered(Address),
}

/// Run `fut` under `after`, tagging a timeout with `operation`.
pub(crate) async fn with_timeout<T, E, F>(
    operation: &'static str,
    after: Duration,
    fut: F,
) -> Result<T, EvaluationError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<EvaluationError>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(EvaluationError::Timeout { operation, after }),
    }
}

/// Wraps [`RiskOracle`] reads for the router.
pub struct RiskEvaluator {
    oracle: Arc<dyn RiskOracle>,
    candidates: Vec<Address>,
    call_timeout: Duration,
}

impl RiskEvaluator {
    /// Candidates are exactly the registry's collaterals.
    pub fn new(
        oracle: Arc<dyn RiskOracle>,
        registry: &SwapPathRegistry,
        call_timeout: Duration,
    ) -> Self {
        Self {
            oracle,
            candidates: registry.candidates(),
            call_timeout,
        }
    }

    pub async fn is_liquidatable(&self, account: Address) -> Result<bool, EvaluationError> {
        with_timeout(
            "isLiquidatable",
            self.call_timeout,
            self.oracle.is_liquidatable(account),
        )
        .await
    }

    pub async fn best_collateral(&self, account: Address) -> Result<BestCollateral, EvaluationError> {
        let collateral = with_timeout(
            "getMaxProfitableCollateralFromCollaterals",
            self.call_timeout,
            self.oracle.max_profitable_collateral(account, &self.candidates),
        )
        .await?;

        let best = if collateral.is_zero() {
            BestCollateral::None
        } else if self.candidates.contains(&collateral) {
            BestCollateral::Registered(collateral)
        } else {
            BestCollateral::Unregistered(collateral)
        };
        debug!(account = %account, best = ?best, "Best collateral evaluated");
        Ok(best)
    }
}
