//! Account address derivation.
//!
//! The address is a pure function of the identity token's {iss, sub, aud}
//! and the per-subject salt. The address seed (salt, subject, audience) is
//! recomputed at signing time because it is part of the final signature.

use std::fmt;
use std::str::FromStr;

use blake2::{digest::consts::U32, Blake2b, Digest};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use super::keys::generate_randomness;
use super::poseidon::{hash_ascii_to_field, parse_field_element, poseidon_hash, to_padded_be_bytes};
use crate::identity::IdentityToken;
use crate::types::{Result, ZkLoginError};

type Blake2b256 = Blake2b<U32>;

/// Signature scheme flag for zkLogin addresses and signatures
pub const ZKLOGIN_FLAG: u8 = 0x05;

/// Claim used as the stable user identifier
pub const KEY_CLAIM_NAME: &str = "sub";

/// Circuit limits for claim names, claim values and audiences
pub const MAX_KEY_CLAIM_NAME_LENGTH: usize = 32;
pub const MAX_KEY_CLAIM_VALUE_LENGTH: usize = 115;
pub const MAX_AUD_VALUE_LENGTH: usize = 145;

/// Address length in bytes
pub const ADDRESS_LEN: usize = 32;

// =============================================================================
// Salt
// =============================================================================

/// Per-subject secret mixed into the address.
///
/// Generated once on a subject's first login and reused forever after;
/// a different salt yields a different address.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Salt(String);

impl Salt {
    /// Fresh 128-bit salt.
    pub fn generate() -> Self {
        Self(generate_randomness())
    }

    /// Accept a decimal salt, checking it is a field element.
    pub fn parse(decimal: &str) -> Result<Self> {
        parse_field_element(decimal)?;
        Ok(Self(decimal.trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn to_field(&self) -> Result<BigUint> {
        parse_field_element(&self.0)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(<redacted>)")
    }
}

// =============================================================================
// Address Seed
// =============================================================================

/// Poseidon commitment to (claim name, claim value, audience, salt).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSeed(BigUint);

impl AddressSeed {
    /// 32-byte big-endian encoding used in address hashing.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&to_padded_be_bytes(&self.0, 32));
        out
    }
}

impl fmt::Display for AddressSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the address seed for a subject/audience pair under `salt`.
pub fn address_seed(salt: &Salt, subject: &str, audience: &str) -> Result<AddressSeed> {
    address_seed_for_claim(salt, KEY_CLAIM_NAME, subject, audience)
}

/// Address seed for an arbitrary key claim.
pub fn address_seed_for_claim(
    salt: &Salt,
    claim_name: &str,
    claim_value: &str,
    audience: &str,
) -> Result<AddressSeed> {
    let seed = poseidon_hash(&[
        hash_ascii_to_field(claim_name, MAX_KEY_CLAIM_NAME_LENGTH)?,
        hash_ascii_to_field(claim_value, MAX_KEY_CLAIM_VALUE_LENGTH)?,
        hash_ascii_to_field(audience, MAX_AUD_VALUE_LENGTH)?,
        poseidon_hash(&[salt.to_field()?])?,
    ])?;
    Ok(AddressSeed(seed))
}

// =============================================================================
// Account Address
// =============================================================================

/// Ledger account address, `0x` followed by 64 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountAddress(String);

impl AccountAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountAddress {
    type Err = ZkLoginError;

    fn from_str(s: &str) -> Result<Self> {
        let hex_part = s.strip_prefix("0x").unwrap_or(s);
        if hex_part.is_empty() || hex_part.len() > ADDRESS_LEN * 2 {
            return Err(ZkLoginError::Serialization(format!("Invalid address: {s}")));
        }
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ZkLoginError::Serialization(format!("Invalid address: {s}")));
        }
        Ok(Self(format!(
            "0x{:0>width$}",
            hex_part.to_ascii_lowercase(),
            width = ADDRESS_LEN * 2
        )))
    }
}

impl TryFrom<String> for AccountAddress {
    type Error = ZkLoginError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AccountAddress> for String {
    fn from(address: AccountAddress) -> Self {
        address.0
    }
}

/// Derive the account address for a verified-structure token and salt.
pub fn derive_address(token: &IdentityToken, salt: &Salt) -> Result<AccountAddress> {
    let seed = address_seed(salt, token.subject(), token.audience())?;
    Ok(address_from_seed(&seed, token.issuer()))
}

/// Address for a given seed and issuer.
pub fn address_from_seed(seed: &AddressSeed, issuer: &str) -> AccountAddress {
    let issuer = normalize_issuer(issuer);
    let issuer_bytes = issuer.as_bytes();

    let mut hasher = Blake2b256::new();
    hasher.update([ZKLOGIN_FLAG]);
    hasher.update([issuer_bytes.len() as u8]);
    hasher.update(issuer_bytes);
    hasher.update(seed.to_be_bytes());

    AccountAddress(format!("0x{}", hex::encode(hasher.finalize())))
}

fn normalize_issuer(issuer: &str) -> &str {
    if issuer == "accounts.google.com" {
        "https://accounts.google.com"
    } else {
        issuer
    }
}
