//! Identity-provider redirect helpers.
//!
//! The provider returns the token in the URL fragment of the redirect
//! target. Fragments never reach a server, so only the fragment is read.

use serde::Deserialize;
use url::Url;

use crate::crypto::Nonce;
use crate::types::{Result, ZkLoginError};

/// Google's OAuth 2.0 authorization endpoint
pub const GOOGLE_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Default OpenID scope
pub const DEFAULT_SCOPE: &str = "openid email profile";

/// Default redirect target for local development
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/auth/callback";

/// OAuth client registration used to build the authorization URL
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Authorization endpoint of the identity provider
    pub auth_endpoint: String,

    /// OAuth client ID; becomes the token's `aud`
    pub client_id: String,

    /// Where the provider redirects with the token fragment
    pub redirect_uri: String,

    /// Requested scopes
    pub scope: String,
}

impl ProviderConfig {
    /// Google provider with default scope and redirect target
    pub fn google(client_id: impl Into<String>) -> Self {
        Self {
            auth_endpoint: GOOGLE_AUTH_ENDPOINT.to_string(),
            client_id: client_id.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }
}

/// Build the provider URL the operator is sent to.
pub fn authorization_url(config: &ProviderConfig, nonce: &Nonce) -> Result<Url> {
    if config.client_id.is_empty() {
        return Err(ZkLoginError::Config("OAuth client ID is not configured".into()));
    }

    let mut url = Url::parse(&config.auth_endpoint).map_err(|e| {
        ZkLoginError::Config(format!("Invalid auth endpoint {}: {e}", config.auth_endpoint))
    })?;

    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("response_type", "id_token")
        .append_pair("scope", &config.scope)
        .append_pair("nonce", nonce.as_str());

    Ok(url)
}

#[derive(Debug, Deserialize)]
struct FragmentParams {
    id_token: Option<String>,
}

/// Extract `id_token` from a redirect URL or a bare fragment.
///
/// The query string is ignored even if it carries an `id_token`.
pub fn token_from_redirect(input: &str) -> Option<String> {
    let input = input.trim();
    let fragment = match Url::parse(input) {
        Ok(url) => url.fragment()?.to_string(),
        Err(_) => input.strip_prefix('#').unwrap_or(input).to_string(),
    };

    serde_urlencoded::from_str::<FragmentParams>(&fragment)
        .ok()?
        .id_token
        .filter(|token| !token.is_empty())
}
