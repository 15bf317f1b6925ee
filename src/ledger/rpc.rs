//! JSON-RPC ledger client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use super::abort::parse_move_abort;
use super::{EpochInfo, ExecutionReceipt, LedgerClient, MoveCall, NATIVE_COIN_TYPE};
use crate::crypto::AccountAddress;
use crate::types::{LedgerRejection, Result, ZkLoginError};

/// Public devnet fullnode
pub const DEFAULT_RPC_URL: &str = "https://fullnode.devnet.sui.io:443";

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: JsonValue,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SystemState {
    #[serde(deserialize_with = "u64_from_string")]
    epoch: u64,
    #[serde(deserialize_with = "u64_from_string")]
    epoch_start_timestamp_ms: u64,
    #[serde(deserialize_with = "u64_from_string")]
    epoch_duration_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Balance {
    #[serde(deserialize_with = "u64_from_string")]
    total_balance: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBlockBytes {
    tx_bytes: String,
}

#[derive(Debug, Deserialize)]
struct TransactionBlockResponse {
    digest: String,
    effects: Option<Effects>,
}

#[derive(Debug, Deserialize)]
struct Effects {
    status: ExecutionStatus,
}

#[derive(Debug, Deserialize)]
struct ExecutionStatus {
    status: String,
    error: Option<String>,
}

/// Large integers arrive as decimal strings; accept plain numbers too.
fn u64_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
        StringOrNumber::Number(n) => Ok(n),
    }
}

// =============================================================================
// Client
// =============================================================================

/// Ledger client over the fullnode JSON-RPC API.
pub struct RpcLedgerClient {
    http: Client,
    url: String,
    coin_type: String,
    next_id: AtomicU64,
}

impl RpcLedgerClient {
    /// Create a client for the fullnode at `url`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ZkLoginError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            url: url.into(),
            coin_type: NATIVE_COIN_TYPE.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Query balances of another coin type.
    pub fn with_coin_type(mut self, coin_type: impl Into<String>) -> Self {
        self.coin_type = coin_type.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one call. RPC-level errors come back as `Err(RpcErrorBody)`
    /// so each method can classify them.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: JsonValue,
    ) -> Result<std::result::Result<T, RpcErrorBody>> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, id = request.id, "Ledger RPC call");

        let response = self.http.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ZkLoginError::Network(format!(
                "{method} failed ({status}): {body}"
            )));
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ZkLoginError::Serialization(format!("Invalid {method} response: {e}")))?;

        match (body.result, body.error) {
            (_, Some(error)) => Ok(Err(error)),
            (Some(result), None) => Ok(Ok(result)),
            (None, None) => Err(ZkLoginError::Serialization(format!(
                "{method} response has neither result nor error"
            ))),
        }
    }

    /// Call a read-only method, treating RPC errors as ledger failures.
    async fn query<T: DeserializeOwned>(&self, method: &str, params: JsonValue) -> Result<T> {
        self.call(method, params).await?.map_err(|e| {
            ZkLoginError::Network(format!("{method} error {}: {}", e.code, e.message))
        })
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn latest_epoch(&self) -> Result<EpochInfo> {
        let state: SystemState = self
            .query("suix_getLatestSuiSystemState", json!([]))
            .await?;

        Ok(EpochInfo {
            epoch: state.epoch,
            start_timestamp_ms: state.epoch_start_timestamp_ms,
            duration_ms: state.epoch_duration_ms,
        })
    }

    async fn balance(&self, owner: &AccountAddress) -> Result<u64> {
        let balance: Balance = self
            .query("suix_getBalance", json!([owner.as_str(), self.coin_type]))
            .await?;
        Ok(balance.total_balance)
    }

    async fn build_move_call(&self, sender: &AccountAddress, call: &MoveCall) -> Result<Vec<u8>> {
        let params = json!([
            sender.as_str(),
            call.package.as_str(),
            call.module,
            call.function,
            call.type_arguments,
            call.arguments,
            null,
            call.gas_budget.to_string(),
            null,
        ]);

        let built: TransactionBlockBytes = self.query("unsafe_moveCall", params).await?;
        Ok(BASE64.decode(built.tx_bytes)?)
    }

    async fn execute(&self, tx_bytes: &[u8], signature: &str) -> Result<ExecutionReceipt> {
        let params = json!([
            BASE64.encode(tx_bytes),
            [signature],
            { "showEffects": true },
            "WaitForLocalExecution",
        ]);

        let response: TransactionBlockResponse =
            match self.call("sui_executeTransactionBlock", params).await? {
                Ok(response) => response,
                Err(error) => {
                    warn!(code = error.code, "Transaction rejected by fullnode");
                    return Err(rejection(error.message));
                }
            };

        match response.effects {
            Some(effects) if effects.status.status != "success" => {
                let message = effects
                    .status
                    .error
                    .unwrap_or_else(|| effects.status.status.clone());
                warn!(digest = %response.digest, "Transaction failed on-chain");
                Err(rejection(message))
            }
            _ => {
                info!(digest = %response.digest, "Transaction executed");
                Ok(ExecutionReceipt {
                    digest: response.digest,
                })
            }
        }
    }
}

fn rejection(message: String) -> ZkLoginError {
    ZkLoginError::LedgerRejection(LedgerRejection {
        abort_code: parse_move_abort(&message),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_state_accepts_strings() {
        let state: SystemState = serde_json::from_value(json!({
            "epoch": "412",
            "epochStartTimestampMs": "1700000000000",
            "epochDurationMs": 86400000,
            "protocolVersion": "42"
        }))
        .unwrap();
        assert_eq!(state.epoch, 412);
        assert_eq!(state.epoch_start_timestamp_ms, 1_700_000_000_000);
        assert_eq!(state.epoch_duration_ms, 86_400_000);
    }

    #[test]
    fn test_rejection_extracts_code() {
        match rejection("MoveAbort(MoveLocation { .. }, 6) in command 0".into()) {
            ZkLoginError::LedgerRejection(r) => assert_eq!(r.abort_code, Some(6)),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
