//! At-rest sealing of session records.
//!
//! # Algorithms
//!
//! - **Key Derivation**: Argon2id over the configured passphrase
//! - **Encryption**: ChaCha20-Poly1305 (authenticated encryption)
//!
//! Each sealed record carries its own KDF salt, nonce and KDF cost, so
//! records written with different parameters can still be opened.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::types::{Result, ZkLoginError};

// =============================================================================
// Constants
// =============================================================================

/// Argon2id memory cost in KiB (64 MB)
pub const ARGON2_MEMORY_KB: u32 = 65536;

/// Argon2id iteration count
pub const ARGON2_ITERATIONS: u32 = 3;

/// Argon2id parallelism (threads)
pub const ARGON2_PARALLELISM: u32 = 4;

/// KDF salt length (16 bytes)
pub const KDF_SALT_LEN: usize = 16;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// Envelope format version
pub const ENVELOPE_VERSION: u8 = 1;

// =============================================================================
// Envelope
// =============================================================================

/// Sealed record as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    pub version: u8,
    pub memory_kb: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub kdf_salt: String,
    pub nonce: String,
    pub ciphertext: String,
}

impl SealedEnvelope {
    /// Whether a JSON document looks like a sealed envelope.
    pub fn is_sealed(value: &serde_json::Value) -> bool {
        value.get("ciphertext").is_some() && value.get("kdf_salt").is_some()
    }
}

// =============================================================================
// Sealer
// =============================================================================

/// Passphrase-based record sealer.
#[derive(Clone)]
pub struct Sealer {
    passphrase: Zeroizing<String>,
    memory_kb: u32,
    iterations: u32,
    parallelism: u32,
}

impl Sealer {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase.into()),
            memory_kb: ARGON2_MEMORY_KB,
            iterations: ARGON2_ITERATIONS,
            parallelism: ARGON2_PARALLELISM,
        }
    }

    /// Override the KDF cost (tests use a cheap setting).
    pub fn with_kdf_cost(mut self, memory_kb: u32, iterations: u32, parallelism: u32) -> Self {
        self.memory_kb = memory_kb;
        self.iterations = iterations;
        self.parallelism = parallelism;
        self
    }

    /// Encrypt `plaintext` under a fresh salt and nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<SealedEnvelope> {
        let mut kdf_salt = [0u8; KDF_SALT_LEN];
        OsRng.fill_bytes(&mut kdf_salt);
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let key = self.derive_key(&kdf_salt, self.memory_kb, self.iterations, self.parallelism)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| ZkLoginError::Crypto(format!("Encryption failed: {e}")))?;

        Ok(SealedEnvelope {
            version: ENVELOPE_VERSION,
            memory_kb: self.memory_kb,
            iterations: self.iterations,
            parallelism: self.parallelism,
            kdf_salt: BASE64.encode(kdf_salt),
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    /// Decrypt an envelope.
    ///
    /// # Errors
    ///
    /// Returns `Crypto` if the passphrase is wrong or the envelope was
    /// tampered with (auth tag verification fails).
    pub fn open(&self, envelope: &SealedEnvelope) -> Result<Zeroizing<Vec<u8>>> {
        if envelope.version != ENVELOPE_VERSION {
            return Err(ZkLoginError::Crypto(format!(
                "Unsupported envelope version {}",
                envelope.version
            )));
        }

        let kdf_salt = BASE64.decode(&envelope.kdf_salt)?;
        let nonce = BASE64.decode(&envelope.nonce)?;
        if nonce.len() != NONCE_LEN {
            return Err(ZkLoginError::Crypto(format!(
                "Invalid nonce length: expected {}, got {}",
                NONCE_LEN,
                nonce.len()
            )));
        }
        let ciphertext = BASE64.decode(&envelope.ciphertext)?;

        let key = self.derive_key(
            &kdf_salt,
            envelope.memory_kb,
            envelope.iterations,
            envelope.parallelism,
        )?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| ZkLoginError::Crypto("Failed to open sealed record (wrong passphrase?)".into()))?;

        Ok(Zeroizing::new(plaintext))
    }

    /// [`Sealer::seal`] on the blocking pool, off the async executor.
    pub async fn seal_blocking(&self, plaintext: Zeroizing<Vec<u8>>) -> Result<SealedEnvelope> {
        let sealer = self.clone();
        tokio::task::spawn_blocking(move || sealer.seal(&plaintext))
            .await
            .map_err(|e| ZkLoginError::Crypto(format!("Sealing task failed: {e}")))?
    }

    /// [`Sealer::open`] on the blocking pool.
    pub async fn open_blocking(&self, envelope: SealedEnvelope) -> Result<Zeroizing<Vec<u8>>> {
        let sealer = self.clone();
        tokio::task::spawn_blocking(move || sealer.open(&envelope))
            .await
            .map_err(|e| ZkLoginError::Crypto(format!("Unsealing task failed: {e}")))?
    }

    fn derive_key(
        &self,
        kdf_salt: &[u8],
        memory_kb: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Zeroizing<[u8; 32]>> {
        let params = Params::new(memory_kb, iterations, parallelism, Some(32))
            .map_err(|e| ZkLoginError::Crypto(format!("Invalid Argon2 params: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; 32]);
        argon2
            .hash_password_into(self.passphrase.as_bytes(), kdf_salt, key.as_mut_slice())
            .map_err(|e| ZkLoginError::Crypto(format!("Key derivation failed: {e}")))?;
        Ok(key)
    }
}

impl std::fmt::Debug for Sealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sealer")
            .field("memory_kb", &self.memory_kb)
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealer(passphrase: &str) -> Sealer {
        Sealer::new(passphrase).with_kdf_cost(1024, 1, 1)
    }

    #[test]
    fn test_seal_and_open() {
        let sealer = sealer("correct horse");
        let envelope = sealer.seal(b"session record").unwrap();
        assert_ne!(envelope.ciphertext, BASE64.encode(b"session record"));
        assert_eq!(sealer.open(&envelope).unwrap().as_slice(), b"session record");
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_seal() {
        let sealer = sealer("pw");
        let a = sealer.seal(b"same").unwrap();
        let b = sealer.seal(b"same").unwrap();
        assert_ne!(a.kdf_salt, b.kdf_salt);
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let envelope = sealer("right").seal(b"secret").unwrap();
        assert!(matches!(
            sealer("wrong").open(&envelope),
            Err(ZkLoginError::Crypto(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let sealer = sealer("pw");
        let mut envelope = sealer.seal(b"secret").unwrap();
        let mut bytes = BASE64.decode(&envelope.ciphertext).unwrap();
        bytes[0] ^= 0xff;
        envelope.ciphertext = BASE64.encode(bytes);
        assert!(sealer.open(&envelope).is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_blocking_pool_seal_and_open() {
        let right = sealer("pw");
        let envelope = right
            .seal_blocking(Zeroizing::new(b"session record".to_vec()))
            .await
            .unwrap();
        assert_eq!(
            right.open_blocking(envelope.clone()).await.unwrap().as_slice(),
            b"session record"
        );
        assert!(matches!(
            sealer("wrong").open_blocking(envelope).await,
            Err(ZkLoginError::Crypto(_))
        ));
    }

    #[test]
    fn test_envelope_detection() {
        let envelope = sealer("pw").seal(b"x").unwrap();
        let value = serde_json::to_value(&envelope).unwrap();
        assert!(SealedEnvelope::is_sealed(&value));
        assert!(!SealedEnvelope::is_sealed(&serde_json::json!({"address": "0x1"})));
    }
}
