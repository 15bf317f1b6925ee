//! Identity token parsing.
//!
//! The token is treated as opaque except for `iss`, `sub`, `aud` and
//! `nonce`. Only its structure is checked here (three base64url segments,
//! a JSON header with a known algorithm, JSON claims); the provider's
//! signature is verified inside the proof by the proving service.

use std::collections::HashSet;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::types::{ProtocolError, Result};

/// `aud` may legally be a string or a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Audience {
    Single(String),
    Many(Vec<String>),
}

/// Claims as they appear in the token; presence is checked afterwards.
#[derive(Debug, Clone, Deserialize)]
struct RawClaims {
    iss: Option<String>,
    sub: Option<String>,
    aud: Option<Audience>,
    nonce: Option<String>,
    exp: Option<u64>,
}

/// An identity-provider token with its four protocol fields extracted.
#[derive(Clone)]
pub struct IdentityToken {
    raw: String,
    algorithm: Algorithm,
    issuer: String,
    subject: String,
    audience: String,
    nonce: String,
    expires_at: Option<u64>,
}

impl IdentityToken {
    /// Parse a compact JWT without verifying its signature.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` if the token is not structurally a JWT
    /// - `MissingIdentity` if `iss`, `sub`, `aud` or `nonce` is absent
    /// - `UnsupportedAudience` if `aud` is a list
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let header = decode_header(raw)?;

        let mut validation = Validation::new(header.alg);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let claims = decode::<RawClaims>(raw, &DecodingKey::from_secret(&[]), &validation)?.claims;

        let issuer = claims.iss.ok_or(ProtocolError::MissingIdentity("iss"))?;
        let subject = claims.sub.ok_or(ProtocolError::MissingIdentity("sub"))?;
        let audience = match claims.aud {
            Some(Audience::Single(aud)) => aud,
            Some(Audience::Many(_)) => return Err(ProtocolError::UnsupportedAudience.into()),
            None => return Err(ProtocolError::MissingIdentity("aud").into()),
        };
        let nonce = claims.nonce.ok_or(ProtocolError::MissingIdentity("nonce"))?;

        Ok(Self {
            raw: raw.to_string(),
            algorithm: header.alg,
            issuer,
            subject,
            audience,
            nonce,
            expires_at: claims.exp,
        })
    }

    /// The compact token as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Provider-declared expiry (Unix seconds), if present
    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }
}

impl std::fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityToken")
            .field("iss", &self.issuer)
            .field("sub", &self.subject)
            .field("aud", &self.audience)
            .field("alg", &self.algorithm)
            .finish_non_exhaustive()
    }
}
