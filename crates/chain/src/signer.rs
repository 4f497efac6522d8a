//! Transaction submission for liquidations.
//!
//! [`SubmissionSerializer`] owns the bot's nonce and guarantees at most one
//! submission is in flight. [`TransactionSender`] signs and broadcasts a
//! single transaction with an explicit nonce and polls for its receipt.

use std::future::Future;
use std::time::{Duration, Instant};

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::executor::{ChainError, ReceiptStatus};

/// How often an unconfirmed transaction's receipt is polled.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Nonce bookkeeping guarded by the serializer's lock.
#[derive(Debug)]
struct SubmissionState {
    next_nonce: u64,
}

/// Serializes transaction submissions across all concurrent liquidation
/// attempts.
///
/// Waiters are served in arrival order (`tokio::sync::Mutex` is fair). The
/// closure passed to [`submit`](Self::submit) receives the nonce to use; the
/// nonce advances by exactly one when the closure succeeds and is left
/// untouched when it fails.
#[derive(Debug)]
pub struct SubmissionSerializer {
    state: Mutex<SubmissionState>,
}

impl SubmissionSerializer {
    /// Create a serializer starting at the on-chain transaction count.
    pub fn new(initial_nonce: u64) -> Self {
        Self {
            state: Mutex::new(SubmissionState {
                next_nonce: initial_nonce,
            }),
        }
    }

    /// Run `send` exclusively with the current nonce.
    ///
    /// Not reentrant: calling `submit` from inside `send` deadlocks.
    pub async fn submit<F, Fut, T, E>(&self, send: F) -> Result<T, E>
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut state = self.state.lock().await;
        let nonce = state.next_nonce;

        let result = send(nonce).await;
        if result.is_ok() {
            state.next_nonce += 1;
            debug!(nonce, next_nonce = state.next_nonce, "Submission accepted");
        }
        result
    }

    /// Nonce the next submission will use.
    pub async fn current_nonce(&self) -> u64 {
        self.state.lock().await.next_nonce
    }

    /// Move the nonce up to `chain_nonce` if the chain is ahead.
    ///
    /// Returns whether the nonce changed. Never lowers it.
    pub async fn raise_to(&self, chain_nonce: u64) -> bool {
        let mut state = self.state.lock().await;
        if chain_nonce > state.next_nonce {
            warn!(
                local = state.next_nonce,
                chain = chain_nonce,
                "Local nonce behind chain, raising"
            );
            state.next_nonce = chain_nonce;
            true
        } else {
            false
        }
    }
}

/// Signs and broadcasts transactions from the bot's key.
pub struct TransactionSender {
    url: Url,
    wallet: EthereumWallet,
    /// Signer address
    pub address: Address,
    chain_id: u64,
    /// Fixed gas limit; the node estimates when unset.
    gas_limit: Option<u64>,
}

/// Builder for [`TransactionSender`].
pub struct TransactionSenderBuilder {
    rpc_url: String,
    chain_id: u64,
    gas_limit: Option<u64>,
}

impl TransactionSenderBuilder {
    pub fn new(rpc_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            chain_id,
            gas_limit: None,
        }
    }

    /// Use a fixed gas limit instead of per-transaction estimation.
    pub fn gas_limit(mut self, limit: Option<u64>) -> Self {
        self.gas_limit = limit;
        self
    }

    /// Build the sender. The key may carry a `0x` prefix.
    pub fn build(self, private_key: &str) -> Result<TransactionSender> {
        let signer: PrivateKeySigner = private_key
            .trim_start_matches("0x")
            .parse()
            .context("PRIVATE_KEY is not a valid secp256k1 key")?;
        let address = signer.address();
        let url: Url = self
            .rpc_url
            .parse()
            .with_context(|| format!("invalid rpc url {}", self.rpc_url))?;

        info!(
            address = %address,
            chain_id = self.chain_id,
            gas_limit = ?self.gas_limit,
            "Transaction sender initialized"
        );

        Ok(TransactionSender {
            url,
            wallet: EthereumWallet::from(signer),
            address,
            chain_id: self.chain_id,
            gas_limit: self.gas_limit,
        })
    }
}

impl TransactionSender {
    /// Create a sender that lets the node estimate gas.
    pub fn new(private_key: &str, rpc_url: &str, chain_id: u64) -> Result<Self> {
        TransactionSenderBuilder::new(rpc_url, chain_id).build(private_key)
    }

    /// Sign and broadcast `calldata` to `to` with an explicit nonce.
    ///
    /// Returns as soon as the node accepts the transaction.
    pub async fn send_calldata(
        &self,
        to: Address,
        calldata: Bytes,
        nonce: u64,
    ) -> Result<B256, ChainError> {
        let start = Instant::now();

        let mut tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(to)
            .with_input(calldata)
            .with_value(U256::ZERO)
            .with_nonce(nonce)
            .with_chain_id(self.chain_id);
        if let Some(limit) = self.gas_limit {
            tx = tx.with_gas_limit(limit);
        }

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(self.url.clone());

        let pending = provider.send_transaction(tx).await?;
        let tx_hash = *pending.tx_hash();

        info!(
            tx_hash = %tx_hash,
            nonce,
            submit_ms = start.elapsed().as_millis(),
            "Transaction submitted"
        );
        Ok(tx_hash)
    }

    /// Poll until `tx_hash` has a receipt. Callers bound this with a timeout.
    pub async fn wait_for_receipt(&self, tx_hash: B256) -> Result<ReceiptStatus, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let provider = &provider;
        let start = Instant::now();

        let status = poll_receipt(tx_hash, RECEIPT_POLL_INTERVAL, move || async move {
            let receipt = provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(ChainError::from)?;
            Ok::<_, ChainError>(receipt.map(|receipt| {
                let block = receipt.block_number;
                let gas_used = receipt.gas_used;
                if receipt.status() {
                    ReceiptStatus::Succeeded { block, gas_used }
                } else {
                    ReceiptStatus::Reverted { block, gas_used }
                }
            }))
        })
        .await;

        debug!(
            tx_hash = %tx_hash,
            status = ?status,
            confirm_ms = start.elapsed().as_millis(),
            "Receipt received"
        );
        Ok(status)
    }

    /// Pending transaction count of the signer.
    pub async fn pending_nonce(&self) -> Result<u64, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        Ok(provider.get_transaction_count(self.address).pending().await?)
    }

}

/// Poll `fetch` every `interval` until it returns a receipt.
///
/// A failed poll is logged and retried: the transaction is already out, so
/// one bad response from the node must not end the wait.
async fn poll_receipt<F, Fut>(tx_hash: B256, interval: Duration, mut fetch: F) -> ReceiptStatus
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<ReceiptStatus>, ChainError>>,
{
    let mut failures: u32 = 0;
    loop {
        match fetch().await {
            Ok(Some(status)) => return status,
            Ok(None) => {}
            Err(e) => {
                failures += 1;
                warn!(
                    tx_hash = %tx_hash,
                    failures,
                    error = %e,
                    "Receipt poll failed, retrying"
                );
            }
        }
        tokio::time::sleep(interval).await;
    }
}

impl std::fmt::Debug for TransactionSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSender")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("url", &self.url.as_str())
            .field("gas_limit", &self.gas_limit)
            .finish_non_exhaustive()
    }
}
