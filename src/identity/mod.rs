//! Identity provider interaction
//!
//! Provides:
//! - Structural parsing of identity tokens (claims extraction only)
//! - Authorization URL construction carrying the login nonce
//! - Token extraction from the redirect fragment

pub mod jwt;
pub mod provider;

pub use jwt::IdentityToken;
pub use provider::{authorization_url, token_from_redirect, ProviderConfig};
