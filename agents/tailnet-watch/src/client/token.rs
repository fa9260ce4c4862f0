//! OAuth client-credentials token cache
//!
//! The access token is cached in the shared [`KvStore`] so that separate
//! invocations (and separate processes on the same store) reuse it until it
//! is close to expiry. Cache read and write failures are logged and never
//! fail the exchange.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tailnet_watch_core::KvStore;

use super::SourceError;
use crate::config::MonitorConfig;
use crate::contracts::{CachedToken, OAuthTokenResponse};

pub struct TokenCache {
    base_url: String,
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
    timeout: Duration,
    kv: Arc<dyn KvStore>,
    cache_key: String,
    refresh_buffer_ms: i64,
}

impl fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("base_url", &self.base_url)
            .field("cache_key", &self.cache_key)
            .field("refresh_buffer_ms", &self.refresh_buffer_ms)
            .finish_non_exhaustive()
    }
}

impl TokenCache {
    pub fn from_config(config: &MonitorConfig, kv: Arc<dyn KvStore>, client: reqwest::Client) -> Self {
        let refresh_buffer_ms = i64::try_from(config.token_refresh_buffer_seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);

        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client_id: config.oauth_client_id.clone(),
            client_secret: config.oauth_client_secret.clone(),
            client,
            timeout: config.request_timeout(),
            kv,
            cache_key: config.token_cache_key.clone(),
            refresh_buffer_ms,
        }
    }

    /// A bearer token valid for at least the refresh buffer
    pub async fn access_token(&self) -> Result<String, SourceError> {
        self.access_token_at(Utc::now().timestamp_millis()).await
    }

    pub async fn access_token_at(&self, now_ms: i64) -> Result<String, SourceError> {
        if let Some(cached) = self.cached().await {
            if now_ms < cached.expires_at.saturating_sub(self.refresh_buffer_ms) {
                tracing::debug!(key = %self.cache_key, "Using cached access token");
                return Ok(cached.access_token);
            }
            tracing::debug!(key = %self.cache_key, "Cached access token is expiring, refreshing");
        }

        let fresh = self.exchange().await?;
        let expires_in_ms = i64::try_from(fresh.expires_in)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let cached = CachedToken {
            access_token: fresh.access_token,
            expires_at: now_ms.saturating_add(expires_in_ms),
        };
        self.store(&cached).await;

        Ok(cached.access_token)
    }

    async fn cached(&self) -> Option<CachedToken> {
        match self.kv.get(&self.cache_key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(token) => Some(token),
                Err(e) => {
                    tracing::warn!(key = %self.cache_key, error = %e, "Ignoring undecodable cached token");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %self.cache_key, error = %e, "Token cache read failed");
                None
            }
        }
    }

    async fn store(&self, token: &CachedToken) {
        let value = match serde_json::to_string(token) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot encode access token for caching");
                return;
            }
        };
        if let Err(e) = self.kv.put(&self.cache_key, value).await {
            tracing::warn!(key = %self.cache_key, error = %e, "Token cache write failed");
        }
    }

    async fn exchange(&self) -> Result<OAuthTokenResponse, SourceError> {
        let url = format!("{}/api/v2/oauth/token", self.base_url);
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .client
            .post(&url)
            .form(&form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let token: OAuthTokenResponse = response
                .json()
                .await
                .map_err(|e| SourceError::Parse(e.to_string()))?;
            tracing::info!(expires_in = token.expires_in, "Obtained new access token");
            Ok(token)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(SourceError::Auth(format!(
                "token exchange returned {}: {}",
                status.as_u16(),
                error_text
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tailnet_watch_core::{MemoryStore, StoreError, StoreResult};

    #[derive(Debug)]
    struct UnavailableStore;

    #[async_trait::async_trait]
    impl KvStore for UnavailableStore {
        fn name(&self) -> &str {
            "unavailable"
        }

        async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn put(&self, _key: &str, _value: String) -> StoreResult<()> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn list(&self, _prefix: &str) -> StoreResult<Vec<(String, String)>> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
    }

    fn cache(kv: Arc<dyn KvStore>) -> TokenCache {
        let config = MonitorConfig {
            // Nothing listens here; any exchange attempt fails fast
            api_base_url: "http://127.0.0.1:9".to_string(),
            oauth_client_id: "id".to_string(),
            oauth_client_secret: "secret".to_string(),
            request_timeout_ms: 500,
            ..MonitorConfig::default()
        };
        TokenCache::from_config(&config, kv, reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_fresh_cached_token_is_reused() {
        let kv = Arc::new(MemoryStore::new());
        let token = CachedToken {
            access_token: "cached".to_string(),
            expires_at: 10_000_000,
        };
        kv.put("tailscale_oauth_token", serde_json::to_string(&token).unwrap())
            .await
            .unwrap();

        let tokens = cache(kv);
        assert_eq!(tokens.access_token_at(1_000).await.unwrap(), "cached");
    }

    #[tokio::test]
    async fn test_token_inside_refresh_buffer_is_refreshed() {
        let kv = Arc::new(MemoryStore::new());
        // Expires in 200 s, inside the default 300 s buffer
        let token = CachedToken {
            access_token: "stale".to_string(),
            expires_at: 1_000 + 200_000,
        };
        kv.put("tailscale_oauth_token", serde_json::to_string(&token).unwrap())
            .await
            .unwrap();

        let tokens = cache(kv);
        let err = tokens.access_token_at(1_000).await.unwrap_err();
        assert!(matches!(err, SourceError::Network(_)));
    }

    #[tokio::test]
    async fn test_store_failure_falls_through_to_exchange() {
        let tokens = cache(Arc::new(UnavailableStore));
        // The cache miss is logged; the error comes from the exchange itself
        let err = tokens.access_token_at(1_000).await.unwrap_err();
        assert!(matches!(err, SourceError::Network(_)));
    }
}
