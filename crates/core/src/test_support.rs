//! In-memory doubles for the chain and index capabilities.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use liquidator_api::{AccountCategory, AccountId, AccountIndex, IndexError};
use liquidator_chain::{
    ChainError, LiquidationCall, LiquidationExecutor, ReceiptStatus, RiskOracle, StablePool,
};
use parking_lot::Mutex;

/// Oracle answering from fixed tables.
#[derive(Default)]
pub struct MockOracle {
    pub liquidatable: HashSet<Address>,
    pub best: HashMap<Address, Address>,
    pub failing: HashSet<Address>,
    pub delay: Option<Duration>,
    pub liquidatable_calls: AtomicUsize,
    pub best_calls: Mutex<Vec<(Address, Vec<Address>)>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// `account` is liquidatable and the oracle picks `collateral`.
    pub fn with_target(mut self, account: Address, collateral: Address) -> Self {
        self.liquidatable.insert(account);
        self.best.insert(account, collateral);
        self
    }

    pub fn with_failure(mut self, account: Address) -> Self {
        self.failing.insert(account);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn best_call_count(&self) -> usize {
        self.best_calls.lock().len()
    }
}

#[async_trait]
impl RiskOracle for MockOracle {
    async fn is_liquidatable(&self, account: Address) -> Result<bool, ChainError> {
        self.liquidatable_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(&account) {
            return Err(ChainError::Rpc("connection reset".to_string()));
        }
        Ok(self.liquidatable.contains(&account))
    }

    async fn max_profitable_collateral(
        &self,
        account: Address,
        candidates: &[Address],
    ) -> Result<Address, ChainError> {
        self.best_calls.lock().push((account, candidates.to_vec()));
        Ok(self.best.get(&account).copied().unwrap_or(Address::ZERO))
    }
}

/// Executor recording every call and answering from queues.
pub struct MockExecutor {
    pub pools: HashMap<(Address, Address), StablePool>,
    pub simulate_results: Mutex<VecDeque<Result<(), ChainError>>>,
    pub send_results: Mutex<VecDeque<Result<(), ChainError>>>,
    pub receipt: Mutex<Result<ReceiptStatus, ChainError>>,
    pub send_delay: Option<Duration>,
    pub chain_nonce: AtomicU64,
    pub resolved: Mutex<Vec<(Address, Address)>>,
    pub simulated: Mutex<Vec<LiquidationCall>>,
    pub sent: Mutex<Vec<(LiquidationCall, u64)>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self {
            pools: HashMap::new(),
            simulate_results: Mutex::new(VecDeque::new()),
            send_results: Mutex::new(VecDeque::new()),
            receipt: Mutex::new(Ok(ReceiptStatus::Succeeded {
                block: Some(1),
                gas_used: 21_000,
            })),
            send_delay: None,
            chain_nonce: AtomicU64::new(0),
            resolved: Mutex::new(Vec::new()),
            simulated: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, token_a: Address, token_b: Address, pool: StablePool) -> Self {
        self.pools.insert((token_a, token_b), pool);
        self
    }

    /// Queue dry-run outcomes; once drained, dry-runs pass.
    pub fn with_simulations(self, results: Vec<Result<(), ChainError>>) -> Self {
        *self.simulate_results.lock() = results.into();
        self
    }

    /// Queue send outcomes; once drained, sends succeed.
    pub fn with_sends(self, results: Vec<Result<(), ChainError>>) -> Self {
        *self.send_results.lock() = results.into();
        self
    }

    pub fn with_receipt(self, receipt: Result<ReceiptStatus, ChainError>) -> Self {
        *self.receipt.lock() = receipt;
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    pub fn with_chain_nonce(self, nonce: u64) -> Self {
        self.chain_nonce.store(nonce, Ordering::SeqCst);
        self
    }

    pub fn sent_nonces(&self) -> Vec<u64> {
        self.sent.lock().iter().map(|(_, nonce)| *nonce).collect()
    }
}

/// Transaction hash derived from the nonce so tests can predict it.
pub fn tx_hash_for(nonce: u64) -> B256 {
    B256::left_padding_from(&nonce.to_be_bytes())
}

#[async_trait]
impl LiquidationExecutor for MockExecutor {
    async fn resolve_pool(
        &self,
        token_a: Address,
        token_b: Address,
    ) -> Result<Option<StablePool>, ChainError> {
        self.resolved.lock().push((token_a, token_b));
        Ok(self.pools.get(&(token_a, token_b)).copied())
    }

    async fn simulate(&self, call: &LiquidationCall) -> Result<(), ChainError> {
        self.simulated.lock().push(call.clone());
        self.simulate_results.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn send(&self, call: &LiquidationCall, nonce: u64) -> Result<B256, ChainError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let result = self.send_results.lock().pop_front().unwrap_or(Ok(()));
        self.sent.lock().push((call.clone(), nonce));
        result.map(|()| tx_hash_for(nonce))
    }

    async fn wait_for_receipt(&self, _tx_hash: B256) -> Result<ReceiptStatus, ChainError> {
        self.receipt.lock().clone()
    }

    async fn pending_nonce(&self) -> Result<u64, ChainError> {
        Ok(self.chain_nonce.load(Ordering::SeqCst))
    }
}

/// Index answering from per-category queues, then from a fixed listing.
#[derive(Default)]
pub struct MockIndex {
    pub makers: Vec<AccountId>,
    pub traders: Vec<AccountId>,
    pub failures: Mutex<HashMap<AccountCategory, usize>>,
    pub calls: Mutex<Vec<AccountCategory>>,
}

impl MockIndex {
    pub fn new(makers: &[Address], traders: &[Address]) -> Self {
        let ids = |accounts: &[Address]| {
            accounts
                .iter()
                .map(|a| AccountId::new(a.to_string().to_lowercase()))
                .collect()
        };
        Self {
            makers: ids(makers),
            traders: ids(traders),
            ..Default::default()
        }
    }

    /// The next `times` listings of `category` fail.
    pub fn failing(self, category: AccountCategory, times: usize) -> Self {
        self.failures.lock().insert(category, times);
        self
    }

    pub fn call_count(&self, category: AccountCategory) -> usize {
        self.calls.lock().iter().filter(|c| **c == category).count()
    }
}

#[async_trait]
impl AccountIndex for MockIndex {
    async fn list_all(&self, category: AccountCategory) -> Result<Vec<AccountId>, IndexError> {
        self.calls.lock().push(category);
        {
            let mut failures = self.failures.lock();
            if let Some(remaining) = failures.get_mut(&category) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(IndexError::Status {
                        status: 503,
                        body: "indexer unavailable".to_string(),
                    });
                }
            }
        }
        Ok(match category {
            AccountCategory::Makers => self.makers.clone(),
            AccountCategory::Traders => self.traders.clone(),
        })
    }
}

/// Deterministic test address.
pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}
