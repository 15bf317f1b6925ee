//! Persisted session and pending-login records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{generate_nonce, AccountAddress, EphemeralKeyPair, Nonce, Salt};
use crate::prover::ProofBundle;
use crate::types::Result;

/// A completed login.
///
/// Identity and key material are optional on disk so a partially written
/// record still loads far enough to be recognised as incomplete.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub address: AccountAddress,
    /// Raw identity token
    pub token: String,
    pub salt: Option<Salt>,
    pub ephemeral_key: Option<EphemeralKeyPair>,
    pub max_epoch: u64,
    pub randomness: String,
    pub subject: Option<String>,
    pub audience: Option<String>,
    pub issuer: Option<String>,
    pub proof: Option<ProofBundle>,
    /// Estimated wall-clock end of `max_epoch`
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// First required field that is absent, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.proof.as_ref().map_or(true, |p| p.is_empty()) {
            return Some("proof");
        }
        if self.ephemeral_key.is_none() {
            return Some("ephemeralKey");
        }
        if self.salt.is_none() {
            return Some("salt");
        }
        if self.subject.as_deref().map_or(true, str::is_empty) {
            return Some("subject");
        }
        if self.audience.as_deref().map_or(true, str::is_empty) {
            return Some("audience");
        }
        if self.issuer.as_deref().map_or(true, str::is_empty) {
            return Some("issuer");
        }
        None
    }

    pub fn is_complete(&self) -> bool {
        self.missing_field().is_none()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("address", &self.address)
            .field("max_epoch", &self.max_epoch)
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("has_key", &self.ephemeral_key.is_some())
            .field("has_proof", &self.proof.is_some())
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Material held between `begin-login` and `complete-login`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingLogin {
    pub ephemeral_key: EphemeralKeyPair,
    pub max_epoch: u64,
    pub randomness: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PendingLogin {
    /// Recompute the nonce this material commits to.
    pub fn nonce(&self) -> Result<Nonce> {
        generate_nonce(
            &self.ephemeral_key.public_key_bytes(),
            self.max_epoch,
            &self.randomness,
        )
    }
}

impl std::fmt::Debug for PendingLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLogin")
            .field("ephemeral_key", &self.ephemeral_key)
            .field("max_epoch", &self.max_epoch)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
