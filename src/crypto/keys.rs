//! Ephemeral keys, randomness and the login nonce.
//!
//! # Algorithms
//!
//! - **Ephemeral key**: Ed25519, fresh per login attempt
//! - **Randomness**: 128 bits from the OS RNG, carried as a decimal string
//! - **Nonce**: Poseidon(pk_high, pk_low, max_epoch, randomness), low 20 bytes,
//!   base64url without padding

use std::fmt;

use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD},
    Engine as _,
};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use num_bigint::BigUint;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use super::poseidon::{parse_field_element, poseidon_hash, to_padded_be_bytes};
use crate::types::{Result, ZkLoginError};

// =============================================================================
// Constants
// =============================================================================

/// Signature scheme flag for Ed25519 keys and signatures
pub const ED25519_FLAG: u8 = 0x00;

/// Ed25519 private key length (32 bytes)
pub const PRIVATE_KEY_LEN: usize = 32;

/// Bytes of entropy in randomness and salt values
pub const RANDOMNESS_LEN: usize = 16;

/// Bytes of the Poseidon digest kept in the nonce
pub const NONCE_BYTES: usize = 20;

/// Encoded nonce length (base64url of 20 bytes, unpadded)
pub const NONCE_LEN: usize = 27;

// =============================================================================
// Ephemeral Key Pair
// =============================================================================

/// Per-session Ed25519 signing key.
///
/// Serialized as the base64 secret key so it can live in the session
/// record; the in-memory key is zeroized when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct EphemeralKeyPair {
    signing_key: SigningKey,
}

impl EphemeralKeyPair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild a keypair from its 32-byte secret.
    pub fn from_secret_bytes(secret: &[u8; PRIVATE_KEY_LEN]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Rebuild a keypair from its base64 secret.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(BASE64.decode(encoded)?);
        let secret: &[u8; PRIVATE_KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            ZkLoginError::Crypto(format!(
                "Invalid secret key length: expected {}, got {}",
                PRIVATE_KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self::from_secret_bytes(secret))
    }

    /// Base64 of the 32-byte secret.
    pub fn secret_base64(&self) -> Zeroizing<String> {
        let secret = Zeroizing::new(self.signing_key.to_bytes());
        Zeroizing::new(BASE64.encode(secret.as_slice()))
    }

    /// The Ed25519 verifying key.
    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Raw 32-byte public key.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.public_key().to_bytes()
    }

    /// Scheme flag followed by the public key.
    pub fn flagged_public_key(&self) -> [u8; 33] {
        flagged_public_key(&self.public_key_bytes())
    }

    /// Extended ephemeral public key sent to the proving service.
    pub fn extended_public_key(&self) -> String {
        BASE64.encode(self.flagged_public_key())
    }

    /// Sign a message (already a digest for transaction signing).
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

impl Serialize for EphemeralKeyPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.secret_base64())
    }
}

impl<'de> Deserialize<'de> for EphemeralKeyPair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = Zeroizing::new(String::deserialize(deserializer)?);
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

fn flagged_public_key(public_key: &[u8; 32]) -> [u8; 33] {
    let mut out = [0u8; 33];
    out[0] = ED25519_FLAG;
    out[1..].copy_from_slice(public_key);
    out
}

// =============================================================================
// Randomness
// =============================================================================

/// 128 random bits rendered as an unsigned decimal string.
///
/// Used for the nonce randomness and for per-subject salts.
pub fn generate_randomness() -> String {
    let mut bytes = [0u8; RANDOMNESS_LEN];
    OsRng.fill_bytes(&mut bytes);
    BigUint::from_bytes_be(&bytes).to_string()
}

// =============================================================================
// Nonce
// =============================================================================

/// Value embedded in the identity-provider request and echoed in the token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Nonce {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Derive the nonce binding an ephemeral key to an epoch bound and randomness.
///
/// Deterministic: the same three inputs always give the same nonce.
///
/// # Arguments
///
/// - `public_key`: 32-byte Ed25519 public key of the ephemeral keypair
/// - `max_epoch`: last epoch in which the ephemeral key is valid
/// - `randomness`: decimal randomness chosen at `begin-login`
pub fn generate_nonce(public_key: &[u8; 32], max_epoch: u64, randomness: &str) -> Result<Nonce> {
    let extended = BigUint::from_bytes_be(&flagged_public_key(public_key));
    let high = &extended >> 128u32;
    let low = &extended % (BigUint::from(1u8) << 128u32);
    let randomness = parse_field_element(randomness)?;

    let digest = poseidon_hash(&[high, low, BigUint::from(max_epoch), randomness])?;
    let truncated = to_padded_be_bytes(&digest, NONCE_BYTES);

    Ok(Nonce(URL_SAFE_NO_PAD.encode(truncated)))
}

// =============================================================================
// Tests
// =============================================================================
