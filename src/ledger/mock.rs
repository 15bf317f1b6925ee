//! Mock ledger for testing and dry runs.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{EpochInfo, ExecutionReceipt, LedgerClient, MoveCall};
use crate::crypto::AccountAddress;
use crate::types::{LedgerRejection, Result, ZkLoginError};

/// One-day epochs, matching mainnet
const MOCK_EPOCH_DURATION_MS: u64 = 86_400_000;

/// A transaction submitted to the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransaction {
    pub tx_bytes: Vec<u8>,
    pub signature: String,
}

/// Mock ledger.
///
/// Transaction bytes are the JSON encoding of `(sender, call)`, so tests
/// can check what was bound before signing.
pub struct MockLedger {
    epoch: Mutex<EpochInfo>,
    balance: AtomicU64,
    reachable: AtomicBool,
    rejection: Mutex<Option<LedgerRejection>>,
    call_count: AtomicU32,
    submitted: Mutex<Vec<SubmittedTransaction>>,
}

impl MockLedger {
    /// Mock at `epoch`, with the epoch having started now.
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch: Mutex::new(EpochInfo {
                epoch,
                start_timestamp_ms: Utc::now().timestamp_millis().max(0) as u64,
                duration_ms: MOCK_EPOCH_DURATION_MS,
            }),
            balance: AtomicU64::new(0),
            reachable: AtomicBool::new(true),
            rejection: Mutex::new(None),
            call_count: AtomicU32::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_balance(self, balance: u64) -> Self {
        self.balance.store(balance, Ordering::SeqCst);
        self
    }

    /// Replace the reported epoch info.
    pub fn set_epoch(&self, info: EpochInfo) {
        if let Ok(mut epoch) = self.epoch.lock() {
            *epoch = info;
        }
    }

    pub fn set_balance(&self, balance: u64) {
        self.balance.store(balance, Ordering::SeqCst);
    }

    /// When unreachable, every call fails with a network error.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Reject subsequent executions with the given abort code.
    pub fn reject_with(&self, abort_code: Option<u64>, message: impl Into<String>) {
        if let Ok(mut rejection) = self.rejection.lock() {
            *rejection = Some(LedgerRejection {
                abort_code,
                message: message.into(),
            });
        }
    }

    /// Total number of calls of any kind.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Transactions accepted for execution (including rejected ones).
    pub fn submitted(&self) -> Vec<SubmittedTransaction> {
        self.submitted
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn enter(&self) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ZkLoginError::Network("mock ledger unreachable".to_string()))
        }
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn latest_epoch(&self) -> Result<EpochInfo> {
        self.enter()?;
        self.epoch
            .lock()
            .map(|epoch| *epoch)
            .map_err(|_| ZkLoginError::Network("mock ledger poisoned".to_string()))
    }

    async fn balance(&self, _owner: &AccountAddress) -> Result<u64> {
        self.enter()?;
        Ok(self.balance.load(Ordering::SeqCst))
    }

    async fn build_move_call(&self, sender: &AccountAddress, call: &MoveCall) -> Result<Vec<u8>> {
        self.enter()?;
        Ok(serde_json::to_vec(&(sender, call))?)
    }

    async fn execute(&self, tx_bytes: &[u8], signature: &str) -> Result<ExecutionReceipt> {
        self.enter()?;
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(SubmittedTransaction {
                tx_bytes: tx_bytes.to_vec(),
                signature: signature.to_string(),
            });
        }

        let rejection = self.rejection.lock().ok().and_then(|r| r.clone());
        if let Some(rejection) = rejection {
            return Err(ZkLoginError::LedgerRejection(rejection));
        }

        Ok(ExecutionReceipt {
            digest: hex::encode(&tx_bytes[..tx_bytes.len().min(16)]),
        })
    }
}
