//! Ledger client collaborator.
//!
//! The orchestrator needs four things from the network: the current epoch,
//! an account balance, transaction bytes for a Move call, and submission of
//! a signed transaction. Rejections are classified into structured
//! [`LedgerRejection`](crate::types::LedgerRejection)s here at the boundary.

pub mod abort;
pub mod mock;
pub mod rpc;
pub mod transaction;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::AccountAddress;
use crate::types::Result;

pub use abort::{parse_move_abort, AbortCode};
pub use mock::MockLedger;
pub use rpc::RpcLedgerClient;
pub use transaction::{MoveCall, PendingTransaction};

/// Native coin type used for balance queries
pub const NATIVE_COIN_TYPE: &str = "0x2::sui::SUI";

/// Base units per whole native coin
pub const BASE_UNITS_PER_COIN: u64 = 1_000_000_000;

/// Current epoch as reported by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochInfo {
    pub epoch: u64,
    pub start_timestamp_ms: u64,
    pub duration_ms: u64,
}

impl EpochInfo {
    /// Estimated wall-clock end of epoch `max_epoch`.
    ///
    /// Assumes every epoch until then lasts `duration_ms`. A bound already
    /// behind the current epoch yields the current epoch's start.
    pub fn deadline_for(&self, max_epoch: u64) -> Option<DateTime<Utc>> {
        let remaining_epochs = if max_epoch >= self.epoch {
            max_epoch - self.epoch + 1
        } else {
            0
        };
        let end_ms = remaining_epochs
            .checked_mul(self.duration_ms)?
            .checked_add(self.start_timestamp_ms)?;
        Utc.timestamp_millis_opt(i64::try_from(end_ms).ok()?).single()
    }
}

/// Result of a successful execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    /// Transaction digest
    pub digest: String,
}

/// Ledger-network client.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current epoch with its timing.
    async fn latest_epoch(&self) -> Result<EpochInfo>;

    /// Native coin balance in base units.
    async fn balance(&self, owner: &AccountAddress) -> Result<u64>;

    /// Serialized transaction bytes for `call` sent by `sender`.
    async fn build_move_call(&self, sender: &AccountAddress, call: &MoveCall) -> Result<Vec<u8>>;

    /// Submit signed transaction bytes.
    ///
    /// Fails with `LedgerRejection` when the transaction executes but does
    /// not succeed, and with `Network` when the ledger is unreachable.
    async fn execute(&self, tx_bytes: &[u8], signature: &str) -> Result<ExecutionReceipt>;
}

/// Render base units as whole coins for display.
pub fn format_coin(base_units: u64) -> String {
    format!(
        "{}.{:09}",
        base_units / BASE_UNITS_PER_COIN,
        base_units % BASE_UNITS_PER_COIN
    )
}
