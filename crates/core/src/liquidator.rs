//! Per-account liquidation routing.
//!
//! [`LiquidationRouter::liquidate`] takes one account from "maybe at risk"
//! to a classified [`LiquidationOutcome`]: evaluate, pick the route, dry-run,
//! submit through the serializer and wait for the receipt. Every failure is
//! folded into the outcome; nothing here returns an error to the scan loop.

use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::{Address, B256};
use liquidator_chain::{LiquidationCall, LiquidationExecutor, ReceiptStatus, SubmissionSerializer};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{BotConfig, LiquidationLimits, RetryPolicy, TimeoutConfig};
use crate::paths::{CollateralPath, SwapPathRegistry};
use crate::risk::{with_timeout, BestCollateral, EvaluationError, RiskEvaluator};

/// How one liquidation attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiquidationOutcome {
    NotLiquidatable,
    /// The oracle returned the zero-address sentinel.
    NoProfitableCollateral,
    /// The oracle named a collateral with no configured route.
    UnregisteredCollateral,
    /// No stable pool swaps the collateral into the settlement token.
    NoLiquidPool,
    EvaluationFailed { reason: String },
    /// The dry-run reverted; nothing was submitted.
    WillFail { reason: String },
    SendFailed { reason: String },
    Succeeded { tx: B256 },
    RevertedOnChain { tx: B256 },
    ReceiptUnknown { tx: B256, reason: String },
}

/// Transient record of one account's attempt, logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationAttempt {
    pub account: Address,
    pub collateral: Option<Address>,
    pub method: Option<&'static str>,
    pub outcome: LiquidationOutcome,
    pub send_attempts: u32,
}

impl LiquidationAttempt {
    fn new(account: Address) -> Self {
        Self {
            account,
            collateral: None,
            method: None,
            outcome: LiquidationOutcome::NotLiquidatable,
            send_attempts: 0,
        }
    }
}

/// Routes liquidatable accounts to the right contract entry point.
pub struct LiquidationRouter {
    evaluator: RiskEvaluator,
    executor: Arc<dyn LiquidationExecutor>,
    serializer: Arc<SubmissionSerializer>,
    registry: Arc<SwapPathRegistry>,
    limits: LiquidationLimits,
    settlement_token: Address,
    timeouts: TimeoutConfig,
    retry_policy: RetryPolicy,
}

impl LiquidationRouter {
    pub fn new(
        evaluator: RiskEvaluator,
        executor: Arc<dyn LiquidationExecutor>,
        serializer: Arc<SubmissionSerializer>,
        registry: Arc<SwapPathRegistry>,
        limits: LiquidationLimits,
        settlement_token: Address,
        bot: &BotConfig,
    ) -> Self {
        Self {
            evaluator,
            executor,
            serializer,
            registry,
            limits,
            settlement_token,
            timeouts: bot.timeouts.clone(),
            retry_policy: bot.submission.retry_policy,
        }
    }

    /// Try to liquidate `account`'s most profitable registered collateral.
    #[instrument(skip_all, fields(account = %account))]
    pub async fn liquidate(&self, account: Address) -> LiquidationAttempt {
        let start = Instant::now();
        let mut attempt = LiquidationAttempt::new(account);
        attempt.outcome = self.run(&mut attempt).await;

        debug!(
            account = %account,
            outcome = ?attempt.outcome,
            send_attempts = attempt.send_attempts,
            elapsed_ms = start.elapsed().as_millis(),
            "Liquidation attempt finished"
        );
        attempt
    }

    async fn run(&self, attempt: &mut LiquidationAttempt) -> LiquidationOutcome {
        let account = attempt.account;

        match self.evaluator.is_liquidatable(account).await {
            Ok(true) => {}
            Ok(false) => return LiquidationOutcome::NotLiquidatable,
            Err(e) => return evaluation_failed(account, "isLiquidatable", e),
        }

        let collateral = match self.evaluator.best_collateral(account).await {
            Ok(BestCollateral::Registered(collateral)) => collateral,
            Ok(BestCollateral::None) => {
                info!(account = %account, "No profitable collateral in path map");
                return LiquidationOutcome::NoProfitableCollateral;
            }
            Ok(BestCollateral::Unregistered(collateral)) => {
                attempt.collateral = Some(collateral);
                warn!(
                    account = %account,
                    collateral = %collateral,
                    "Oracle named an unregistered collateral"
                );
                return LiquidationOutcome::UnregisteredCollateral;
            }
            Err(e) => return evaluation_failed(account, "bestCollateral", e),
        };
        attempt.collateral = Some(collateral);

        let Some(path) = self.registry.get(&collateral) else {
            warn!(account = %account, collateral = %collateral, "Unknown collateral");
            return LiquidationOutcome::UnregisteredCollateral;
        };
        attempt.method = Some(path.method_name());

        let call = match self.build_call(account, collateral, path).await {
            Ok(Some(call)) => call,
            Ok(None) => {
                warn!(
                    account = %account,
                    collateral = %collateral,
                    settlement_token = %self.settlement_token,
                    "No liquid stable pool for collateral"
                );
                return LiquidationOutcome::NoLiquidPool;
            }
            Err(e) => return evaluation_failed(account, "findCurveFactoryAndPoolForCoins", e),
        };

        self.execute(attempt, &call).await
    }

    /// Build the call for `path`. `Ok(None)` when no stable pool exists.
    async fn build_call(
        &self,
        account: Address,
        collateral: Address,
        path: &CollateralPath,
    ) -> Result<Option<LiquidationCall>, EvaluationError> {
        let max_spent = self.limits.max_settlement_token_spent;
        let min_profit = self.limits.min_settlement_token_profit;

        match path {
            CollateralPath::DirectSwap { head, tail } => Ok(Some(LiquidationCall::direct(
                account,
                max_spent,
                min_profit,
                head.to_abi(),
                tail.clone(),
            ))),
            CollateralPath::PooledSwap {
                uni_pool,
                stable_pool,
            } => {
                let pool = match stable_pool {
                    Some(pool) => *pool,
                    None => {
                        let resolved = with_timeout(
                            "findCurveFactoryAndPoolForCoins",
                            self.timeouts.call(),
                            self.executor.resolve_pool(collateral, self.settlement_token),
                        )
                        .await?;
                        match resolved {
                            Some(pool) => pool,
                            None => return Ok(None),
                        }
                    }
                };
                Ok(Some(LiquidationCall::through_pool(
                    account,
                    max_spent,
                    min_profit,
                    *uni_pool,
                    pool.factory,
                    pool.pool,
                    collateral,
                )))
            }
        }
    }

    /// Dry-run, submit and confirm `call`, resending per the retry policy.
    async fn execute(
        &self,
        attempt: &mut LiquidationAttempt,
        call: &LiquidationCall,
    ) -> LiquidationOutcome {
        let account = attempt.account;
        let collateral = attempt.collateral.unwrap_or_default();
        let method = call.method_name();
        let max_sends = self.retry_policy.max_sends();

        loop {
            match with_timeout("dry-run", self.timeouts.call(), self.executor.simulate(call)).await
            {
                Ok(()) => {}
                // Only an EVM revert predicts failure; node and transport
                // errors say nothing about the call.
                Err(EvaluationError::Chain(e)) if e.is_revert() => {
                    warn!(
                        account = %account,
                        collateral = %collateral,
                        method,
                        reason = %e.reason(),
                        "Liquidation will fail"
                    );
                    return LiquidationOutcome::WillFail {
                        reason: e.reason().to_string(),
                    };
                }
                Err(e) => return evaluation_failed(account, "dry-run", e),
            }

            attempt.send_attempts += 1;
            let sent = self
                .serializer
                .submit(|nonce| {
                    with_timeout("send", self.timeouts.send(), self.executor.send(call, nonce))
                })
                .await;

            match sent {
                Ok(tx) => {
                    info!(
                        account = %account,
                        collateral = %collateral,
                        method,
                        tx_hash = %tx,
                        "Liquidation transaction sent"
                    );
                    return self.confirm(account, collateral, method, tx).await;
                }
                Err(e) => {
                    let reason = send_reason(&e);
                    error!(
                        account = %account,
                        collateral = %collateral,
                        method,
                        attempt = attempt.send_attempts,
                        reason = %reason,
                        "Liquidation transaction send failed"
                    );
                    self.resync_nonce().await;

                    if attempt.send_attempts >= max_sends {
                        return LiquidationOutcome::SendFailed { reason };
                    }
                }
            }
        }
    }

    async fn confirm(
        &self,
        account: Address,
        collateral: Address,
        method: &'static str,
        tx: B256,
    ) -> LiquidationOutcome {
        let receipt = with_timeout(
            "receipt",
            self.timeouts.receipt(),
            self.executor.wait_for_receipt(tx),
        )
        .await;

        match receipt {
            Ok(ReceiptStatus::Succeeded { block, gas_used }) => {
                info!(
                    account = %account,
                    collateral = %collateral,
                    method,
                    tx_hash = %tx,
                    block = ?block,
                    gas_used,
                    "Liquidation succeeded"
                );
                LiquidationOutcome::Succeeded { tx }
            }
            Ok(ReceiptStatus::Reverted { block, gas_used }) => {
                error!(
                    account = %account,
                    collateral = %collateral,
                    method,
                    tx_hash = %tx,
                    block = ?block,
                    gas_used,
                    "Liquidation reverted on-chain"
                );
                LiquidationOutcome::RevertedOnChain { tx }
            }
            Err(e) => {
                error!(
                    account = %account,
                    collateral = %collateral,
                    method,
                    tx_hash = %tx,
                    reason = %e,
                    "Liquidation receipt unavailable"
                );
                LiquidationOutcome::ReceiptUnknown {
                    tx,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// After a failed send, the transaction may still have reached the
    /// mempool. Adopt the chain's pending count if it moved past ours.
    async fn resync_nonce(&self) {
        match with_timeout(
            "pending nonce",
            self.timeouts.call(),
            self.executor.pending_nonce(),
        )
        .await
        {
            Ok(chain_nonce) => {
                self.serializer.raise_to(chain_nonce).await;
            }
            Err(e) => warn!(reason = %e, "Failed to read pending nonce"),
        }
    }
}

fn evaluation_failed(
    account: Address,
    operation: &'static str,
    e: EvaluationError,
) -> LiquidationOutcome {
    warn!(account = %account, operation, reason = %e, "Evaluation failed");
    LiquidationOutcome::EvaluationFailed {
        reason: e.to_string(),
    }
}

fn send_reason(e: &EvaluationError) -> String {
    match e {
        EvaluationError::Chain(chain) => chain.reason().to_string(),
        other => other.to_string(),
    }
}
