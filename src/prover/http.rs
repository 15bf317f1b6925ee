//! HTTP proving service client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use super::{ProofBundle, ProofRequest, ProofService};
use crate::types::{Result, ZkLoginError};

/// Public development prover
pub const DEFAULT_PROVER_URL: &str = "https://prover-dev.mystenlabs.com/v1";

/// Proving can take several seconds on a cold circuit
pub const DEFAULT_PROVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Prover reached over HTTPS with a JSON body.
pub struct HttpProver {
    client: Client,
    url: String,
}

impl HttpProver {
    /// Create a prover client for `url` with the given request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ZkLoginError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Client for the public development prover.
    pub fn dev() -> Result<Self> {
        Self::new(DEFAULT_PROVER_URL, DEFAULT_PROVER_TIMEOUT)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ProofService for HttpProver {
    async fn request_proof(&self, request: &ProofRequest) -> Result<ProofBundle> {
        debug!(url = %self.url, max_epoch = %request.max_epoch, "Requesting proof");

        let response = self.client.post(&self.url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ZkLoginError::ProofService {
                status: status.as_u16(),
                body,
            });
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| ZkLoginError::Serialization(format!("Invalid proof response: {e}")))?;

        let bundle = ProofBundle::from_json(body)?;
        info!("Proof obtained from proving service");
        Ok(bundle)
    }
}
