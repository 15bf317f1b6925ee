//! Zero-knowledge proof acquisition.
//!
//! The proving service attests that the identity token is valid and bound
//! to the ephemeral key, without revealing the token on-chain. The returned
//! bundle is opaque here: it is stored verbatim and only merged with the
//! address seed at signing time.

pub mod http;
pub mod mock;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::crypto::{address::KEY_CLAIM_NAME, EphemeralKeyPair, Salt};
use crate::identity::IdentityToken;
use crate::types::{Result, ZkLoginError};

pub use http::HttpProver;
pub use mock::MockProver;

// =============================================================================
// Request / Response
// =============================================================================

/// Body sent to the proving service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequest {
    pub jwt: String,
    pub extended_ephemeral_public_key: String,
    pub max_epoch: String,
    pub jwt_randomness: String,
    pub salt: String,
    pub key_claim_name: String,
}

impl ProofRequest {
    /// Assemble the request from the pending login material.
    pub fn new(
        token: &IdentityToken,
        ephemeral_key: &EphemeralKeyPair,
        max_epoch: u64,
        randomness: &str,
        salt: &Salt,
    ) -> Self {
        Self {
            jwt: token.raw().to_string(),
            extended_ephemeral_public_key: ephemeral_key.extended_public_key(),
            max_epoch: max_epoch.to_string(),
            jwt_randomness: randomness.to_string(),
            salt: salt.as_str().to_string(),
            key_claim_name: KEY_CLAIM_NAME.to_string(),
        }
    }
}

impl std::fmt::Debug for ProofRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofRequest")
            .field("extended_ephemeral_public_key", &self.extended_ephemeral_public_key)
            .field("max_epoch", &self.max_epoch)
            .field("key_claim_name", &self.key_claim_name)
            .finish_non_exhaustive()
    }
}

/// Proof artifact exactly as returned by the proving service.
///
/// Valid only together with the ephemeral key, epoch bound, randomness and
/// salt it was requested with; it is never split or reused across keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofBundle(JsonValue);

impl ProofBundle {
    /// Wrap a JSON object returned by the prover.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Object(_) => Ok(Self(value)),
            other => Err(ZkLoginError::Serialization(format!(
                "Proof response is not a JSON object: {other}"
            ))),
        }
    }

    /// An empty object or null counts as no proof.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }

    pub fn as_json(&self) -> &JsonValue {
        &self.0
    }
}

// =============================================================================
// Proof Service Trait
// =============================================================================

/// External proving endpoint.
#[async_trait]
pub trait ProofService: Send + Sync {
    /// Request a proof for the given token and nonce-binding material.
    ///
    /// Non-success responses fail with `ProofService { status, body }`.
    async fn request_proof(&self, request: &ProofRequest) -> Result<ProofBundle>;
}

/// Bounded retry around a proof request.
///
/// Only transport failures and 5xx responses are retried, with exponential
/// backoff, and never once `deadline` (the ephemeral key's validity) has
/// passed. `attempts` of 1 issues exactly one request.
pub async fn request_with_retry(
    service: &dyn ProofService,
    request: &ProofRequest,
    attempts: u32,
    deadline: DateTime<Utc>,
) -> Result<ProofBundle> {
    let attempts = attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match service.request_proof(request).await {
            Ok(bundle) => {
                debug!(attempt, "Proof received");
                return Ok(bundle);
            }
            Err(e) if attempt < attempts && is_retryable(&e) => {
                let delay = Duration::from_millis(250 * 2u64.pow(attempt - 1));
                let resume_at = Utc::now()
                    + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
                if resume_at >= deadline {
                    warn!(attempt, error = %e, "Proof request failed; epoch bound reached, not retrying");
                    return Err(e);
                }
                warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "Proof request failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_retryable(error: &ZkLoginError) -> bool {
    match error {
        ZkLoginError::Network(_) => true,
        ZkLoginError::ProofService { status, .. } => *status >= 500,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bundle_requires_object() {
        assert!(ProofBundle::from_json(json!({"proofPoints": {}})).is_ok());
        assert!(ProofBundle::from_json(json!([1, 2])).is_err());
        assert!(ProofBundle::from_json(json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = ProofRequest {
            jwt: "a.b.c".into(),
            extended_ephemeral_public_key: "AA==".into(),
            max_epoch: "10".into(),
            jwt_randomness: "5".into(),
            salt: "7".into(),
            key_claim_name: "sub".into(),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["extendedEphemeralPublicKey"], "AA==");
        assert_eq!(body["maxEpoch"], "10");
        assert_eq!(body["jwtRandomness"], "5");
        assert_eq!(body["keyClaimName"], "sub");

        // Debug never prints the token or salt
        let rendered = format!("{request:?}");
        assert!(!rendered.contains("a.b.c"));
    }

    #[tokio::test]
    async fn test_retry_on_server_error() {
        let prover = MockProver::new().fail_times(2, 503);
        let bundle = request_with_retry(
            &prover,
            &MockProver::sample_request(),
            3,
            Utc::now() + chrono::Duration::hours(1),
        )
        .await
        .unwrap();
        assert!(!bundle.is_empty());
        assert_eq!(prover.call_count(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_client_error() {
        let prover = MockProver::new().fail_times(1, 400);
        let result = request_with_retry(
            &prover,
            &MockProver::sample_request(),
            3,
            Utc::now() + chrono::Duration::hours(1),
        )
        .await;
        assert!(matches!(result, Err(ZkLoginError::ProofService { status: 400, .. })));
        assert_eq!(prover.call_count(), 1);
    }

    #[tokio::test]
    async fn test_no_retry_past_deadline() {
        let prover = MockProver::new().fail_times(1, 503);
        let result = request_with_retry(&prover, &MockProver::sample_request(), 5, Utc::now()).await;
        assert!(result.is_err());
        assert_eq!(prover.call_count(), 1);
    }
}
