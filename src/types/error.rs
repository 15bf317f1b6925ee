//! Error types for the zkLogin session orchestrator
//!
//! Three families surface to callers:
//! - `Network`: the epoch lookup, proving service or ledger could not be reached
//! - `Protocol`: required nonce, proof, key or identity material is missing or
//!   inconsistent; fatal to the current operation
//! - `LedgerRejection`: the execution environment refused the transaction,
//!   carrying the numeric abort code when one was reported

use std::fmt;

/// Main error type for orchestrator operations
#[derive(Debug, thiserror::Error)]
pub enum ZkLoginError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Proof service returned {status}: {body}")]
    ProofService { status: u16, body: String },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Ledger rejected transaction: {0}")]
    LedgerRejection(LedgerRejection),

    #[error("Invalid identity token: {0}")]
    InvalidToken(String),

    #[error("Session store error: {0}")]
    Store(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Missing or inconsistent protocol material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// No pending login (ephemeral key, epoch bound, randomness) to complete
    #[error("missing nonce material: no pending login to complete")]
    MissingNonceMaterial,

    /// The token's nonce does not match the nonce derived from the pending key
    #[error("nonce mismatch: token carries {actual}, expected {expected}")]
    NonceMismatch { expected: String, actual: String },

    /// Session has no proof bundle
    #[error("missing proof bundle")]
    MissingProof,

    /// Session has no ephemeral keypair
    #[error("missing ephemeral keypair")]
    MissingKey,

    /// Salt, subject, audience or issuer is absent
    #[error("missing identity field: {0}")]
    MissingIdentity(&'static str),

    /// Token audience is a list; a single audience string is required
    #[error("unsupported audience: array audiences are not supported")]
    UnsupportedAudience,

    /// Value is not a valid BN254 field element
    #[error("invalid field element: {0}")]
    FieldElement(String),

    /// Session epoch bound has passed
    #[error("session expired at epoch bound {max_epoch}")]
    SessionExpired { max_epoch: u64 },

    /// Operation requires a logged-in session
    #[error("no active session")]
    NotLoggedIn,

    /// A session is active; it must end before a new login starts
    #[error("already logged in; log out before starting a new login")]
    AlreadyLoggedIn,

    /// Epoch bound or its deadline overflows the ledger's epoch timing
    #[error("epoch bound out of range: epoch {epoch} + offset {offset}")]
    EpochOutOfRange { epoch: u64, offset: u64 },
}

/// Structured refusal from the execution environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRejection {
    /// Numeric abort code raised by on-chain logic, if any
    pub abort_code: Option<u64>,

    /// Raw message from the ledger
    pub message: String,
}

impl LedgerRejection {
    /// Human-readable reason from the fixed abort code table.
    ///
    /// Unmapped codes render the raw code; rejections without a code
    /// render the ledger's own message.
    pub fn reason(&self) -> String {
        match self.abort_code {
            Some(code) => crate::ledger::AbortCode::from(code).to_string(),
            None => self.message.clone(),
        }
    }
}

impl fmt::Display for LedgerRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.abort_code {
            Some(code) => write!(f, "{} (abort code {})", self.reason(), code),
            None => write!(f, "{}", self.message),
        }
    }
}

impl ZkLoginError {
    /// True for failures caused by an unreachable or failing remote service
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::ProofService { .. })
    }

    /// Abort code if this is a ledger rejection that carried one
    pub fn abort_code(&self) -> Option<u64> {
        match self {
            Self::LedgerRejection(rejection) => rejection.abort_code,
            _ => None,
        }
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for ZkLoginError {
    fn from(err: std::io::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<serde_json::Error> for ZkLoginError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {}", err))
    }
}

impl From<bcs::Error> for ZkLoginError {
    fn from(err: bcs::Error) -> Self {
        Self::Serialization(format!("BCS error: {}", err))
    }
}

impl From<reqwest::Error> for ZkLoginError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for ZkLoginError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::InvalidToken(err.to_string())
    }
}

impl From<base64::DecodeError> for ZkLoginError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Serialization(format!("Base64 error: {}", err))
    }
}

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, ZkLoginError>;
