//! Scan loop orchestration.
//!
//! One cycle discovers every maker and trader from the index, then runs the
//! router over each account in fixed-size concurrent batches. Cycles repeat
//! until the process is stopped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::Address;
use futures::future::join_all;
use liquidator_api::{AccountCategory, AccountIndex, IndexError};
use tracing::{debug, info, instrument, warn};

use crate::config::ScannerConfig;
use crate::liquidator::{LiquidationOutcome, LiquidationRouter};

/// Outcome tallies for one pass over the discovered accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub discovered: usize,
    pub not_liquidatable: usize,
    pub no_profitable_collateral: usize,
    pub unregistered_collateral: usize,
    pub no_liquid_pool: usize,
    pub evaluation_failed: usize,
    pub will_fail: usize,
    pub send_failed: usize,
    pub succeeded: usize,
    pub reverted_on_chain: usize,
    pub receipt_unknown: usize,
}

impl CycleReport {
    pub fn record(&mut self, outcome: &LiquidationOutcome) {
        let slot = match outcome {
            LiquidationOutcome::NotLiquidatable => &mut self.not_liquidatable,
            LiquidationOutcome::NoProfitableCollateral => &mut self.no_profitable_collateral,
            LiquidationOutcome::UnregisteredCollateral => &mut self.unregistered_collateral,
            LiquidationOutcome::NoLiquidPool => &mut self.no_liquid_pool,
            LiquidationOutcome::EvaluationFailed { .. } => &mut self.evaluation_failed,
            LiquidationOutcome::WillFail { .. } => &mut self.will_fail,
            LiquidationOutcome::SendFailed { .. } => &mut self.send_failed,
            LiquidationOutcome::Succeeded { .. } => &mut self.succeeded,
            LiquidationOutcome::RevertedOnChain { .. } => &mut self.reverted_on_chain,
            LiquidationOutcome::ReceiptUnknown { .. } => &mut self.receipt_unknown,
        };
        *slot += 1;
    }

    /// Accounts that reached a final outcome this cycle.
    pub fn processed(&self) -> usize {
        self.not_liquidatable
            + self.no_profitable_collateral
            + self.unregistered_collateral
            + self.no_liquid_pool
            + self.evaluation_failed
            + self.will_fail
            + self.send_failed
            + self.succeeded
            + self.reverted_on_chain
            + self.receipt_unknown
    }

    /// Accounts for which a transaction reached the chain.
    pub fn submitted(&self) -> usize {
        self.succeeded + self.reverted_on_chain + self.receipt_unknown
    }
}

/// Drives discovery and liquidation forever.
pub struct ScanLoop {
    index: Arc<dyn AccountIndex>,
    router: Arc<LiquidationRouter>,
    config: ScannerConfig,
}

impl ScanLoop {
    pub fn new(
        index: Arc<dyn AccountIndex>,
        router: Arc<LiquidationRouter>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            index,
            router,
            config,
        }
    }

    /// Run cycles until the task is dropped.
    ///
    /// A failed discovery is retried after the configured delay; no account
    /// is processed until both listings succeed.
    pub async fn run(&self) {
        info!(
            batch_size = self.config.batch_size,
            discovery_retry_ms = self.config.discovery_retry_ms,
            cycle_interval_ms = self.config.cycle_interval_ms,
            "Starting scan loop"
        );

        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            let accounts = self.discover_with_retry().await;
            let report = self.process(accounts).await;
            log_report(cycle, &report);

            let interval = self.config.cycle_interval();
            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }
    }

    /// One discovery followed by one processing pass.
    pub async fn run_cycle(&self) -> Result<CycleReport, IndexError> {
        let accounts = self.discover().await?;
        Ok(self.process(accounts).await)
    }

    /// Discover until both listings succeed.
    pub async fn discover_with_retry(&self) -> Vec<Address> {
        loop {
            match self.discover().await {
                Ok(accounts) => return accounts,
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_ms = self.config.discovery_retry_ms,
                        "Account discovery failed, retrying"
                    );
                    tokio::time::sleep(self.config.discovery_retry()).await;
                }
            }
        }
    }

    /// List makers and traders concurrently.
    ///
    /// Makers come first. An account present in both listings, or twice in
    /// one, is kept once at its first position.
    #[instrument(skip(self))]
    pub async fn discover(&self) -> Result<Vec<Address>, IndexError> {
        let start = Instant::now();
        let (makers, traders) = tokio::join!(
            self.index.list_all(AccountCategory::Makers),
            self.index.list_all(AccountCategory::Traders),
        );
        let (makers, traders) = (makers?, traders?);
        let listed = makers.len() + traders.len();

        let mut seen = HashSet::with_capacity(listed);
        let mut accounts = Vec::with_capacity(listed);
        for id in makers.iter().chain(traders.iter()) {
            match id.as_str().parse::<Address>() {
                Ok(account) => {
                    if seen.insert(account) {
                        accounts.push(account);
                    }
                }
                Err(e) => warn!(id = %id, error = %e, "Skipping unparsable account id"),
            }
        }

        info!(
            makers = makers.len(),
            traders = traders.len(),
            unique = accounts.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Accounts discovered"
        );
        Ok(accounts)
    }

    /// Liquidate `accounts` in batches; each batch completes before the next.
    pub async fn process(&self, accounts: Vec<Address>) -> CycleReport {
        let mut report = CycleReport {
            discovered: accounts.len(),
            ..Default::default()
        };
        let batch_size = self.config.batch_size.max(1);

        for (i, batch) in accounts.chunks(batch_size).enumerate() {
            debug!(batch = i, size = batch.len(), "Processing batch");
            let attempts = join_all(batch.iter().map(|account| self.router.liquidate(*account))).await;
            for attempt in &attempts {
                report.record(&attempt.outcome);
            }
        }
        report
    }
}

fn log_report(cycle: u64, report: &CycleReport) {
    info!(
        cycle,
        discovered = report.discovered,
        processed = report.processed(),
        not_liquidatable = report.not_liquidatable,
        no_profitable_collateral = report.no_profitable_collateral,
        unregistered_collateral = report.unregistered_collateral,
        no_liquid_pool = report.no_liquid_pool,
        evaluation_failed = report.evaluation_failed,
        will_fail = report.will_fail,
        send_failed = report.send_failed,
        succeeded = report.succeeded,
        reverted_on_chain = report.reverted_on_chain,
        receipt_unknown = report.receipt_unknown,
        "Scan cycle complete"
    );
}
