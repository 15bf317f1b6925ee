//! Mock proving service for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use super::{ProofBundle, ProofRequest, ProofService};
use crate::types::{Result, ZkLoginError};

/// Mock prover.
///
/// Returns a fixed bundle, optionally failing the first N calls with a
/// given HTTP status, and records every request it receives.
pub struct MockProver {
    bundle: ProofBundle,
    fail_remaining: AtomicU32,
    fail_status: u16,
    call_count: AtomicU32,
    requests: Mutex<Vec<ProofRequest>>,
}

impl MockProver {
    /// Create a mock returning [`MockProver::sample_bundle`].
    pub fn new() -> Self {
        Self {
            bundle: Self::sample_bundle(),
            fail_remaining: AtomicU32::new(0),
            fail_status: 500,
            call_count: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Set the bundle returned on success.
    pub fn with_bundle(mut self, bundle: ProofBundle) -> Self {
        self.bundle = bundle;
        self
    }

    /// Fail the next `times` calls with `status`.
    pub fn fail_times(mut self, times: u32, status: u16) -> Self {
        self.fail_remaining = AtomicU32::new(times);
        self.fail_status = status;
        self
    }

    /// Number of times `request_proof` was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ProofRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// A structurally complete proof bundle.
    pub fn sample_bundle() -> ProofBundle {
        ProofBundle(json!({
            "proofPoints": {
                "a": ["1", "2", "1"],
                "b": [["3", "4"], ["5", "6"], ["1", "0"]],
                "c": ["7", "8", "1"]
            },
            "issBase64Details": {
                "value": "wiaXNzIjoiaHR0cHM6Ly9hY2NvdW50cy5nb29nbGUuY29tIiw",
                "indexMod4": 1
            },
            "headerBase64": "eyJhbGciOiJSUzI1NiJ9"
        }))
    }

    /// A request with placeholder values.
    pub fn sample_request() -> ProofRequest {
        ProofRequest {
            jwt: "header.claims.signature".to_string(),
            extended_ephemeral_public_key: "AA==".to_string(),
            max_epoch: "10".to_string(),
            jwt_randomness: "42".to_string(),
            salt: "7".to_string(),
            key_claim_name: "sub".to_string(),
        }
    }
}

impl Default for MockProver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProofService for MockProver {
    async fn request_proof(&self, request: &ProofRequest) -> Result<ProofBundle> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let failing = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ZkLoginError::ProofService {
                status: self.fail_status,
                body: "mock prover failure".to_string(),
            });
        }

        Ok(self.bundle.clone())
    }
}
