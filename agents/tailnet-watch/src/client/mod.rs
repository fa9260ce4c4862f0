//! Liveness source
//!
//! [`DeviceSource`] is the seam the engine polls each cycle.
//! [`TailscaleClient`] implements it against the Tailscale device API,
//! authenticating through a [`TokenCache`].

mod token;

pub use token::TokenCache;

use std::fmt;
use std::time::Duration;
use tailnet_watch_core::Device;

use crate::config::MonitorConfig;
use crate::contracts::DeviceList;

/// Fetch failures. Any of these aborts the cycle.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),
}

/// Supplies the current device list
#[async_trait::async_trait]
pub trait DeviceSource: Send + Sync + fmt::Debug {
    async fn devices(&self) -> Result<Vec<Device>, SourceError>;
}

/// Tailscale device API client
#[derive(Debug)]
pub struct TailscaleClient {
    base_url: String,
    tailnet: String,
    client: reqwest::Client,
    timeout: Duration,
    tokens: TokenCache,
}

impl TailscaleClient {
    pub fn new(
        base_url: impl Into<String>,
        tailnet: impl Into<String>,
        client: reqwest::Client,
        tokens: TokenCache,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tailnet: tailnet.into(),
            client,
            timeout: Duration::from_millis(10_000),
            tokens,
        }
    }

    /// Build the client and its token cache from configuration
    pub fn from_config(config: &MonitorConfig, tokens: TokenCache, client: reqwest::Client) -> Self {
        Self::new(&config.api_base_url, &config.tailnet, client, tokens)
            .with_timeout(config.request_timeout())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl DeviceSource for TailscaleClient {
    async fn devices(&self) -> Result<Vec<Device>, SourceError> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/api/v2/tailnet/{}/devices", self.base_url, self.tailnet);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if response.status().is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| SourceError::Network(e.to_string()))?;
            let list: DeviceList =
                serde_json::from_str(&body).map_err(|e| SourceError::Parse(e.to_string()))?;

            tracing::debug!(count = list.devices.len(), "Fetched device list");
            Ok(list.devices.into_iter().map(Device::from).collect())
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(SourceError::Server {
                status: status.as_u16(),
                message: error_text,
            })
        }
    }
}
