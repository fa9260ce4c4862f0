//! Agent configuration
//!
//! Configuration comes either from environment variables or from a YAML/TOML
//! file, and is validated on every load. Nothing else runs when validation
//! fails.
//!
//! | Key | Environment | Default |
//! |-----|-------------|---------|
//! | `tailnet` | `TAILSCALE_TAILNET` | `-` |
//! | `oauth_client_id` | `TAILSCALE_OAUTH_CLIENT_ID` | required |
//! | `oauth_client_secret` | `TAILSCALE_OAUTH_CLIENT_SECRET` | required |
//! | `api_base_url` | `TAILSCALE_API_BASE_URL` | `https://api.tailscale.com` |
//! | `telegram_bot_token` | `TELEGRAM_BOT_TOKEN` | required |
//! | `telegram_chat_id` | `TELEGRAM_CHAT_ID` | required |
//! | `telegram_base_url` | `TELEGRAM_API_BASE_URL` | `https://api.telegram.org` |
//! | `offline_threshold_minutes` | `TAILNET_WATCH_OFFLINE_THRESHOLD_MINUTES` | 5 |
//! | `reminder_interval_minutes` | `TAILNET_WATCH_REMINDER_INTERVAL_MINUTES` | 240 |
//! | `tag_filter` | `TAILNET_WATCH_TAG_FILTER` | empty (all devices) |
//! | `token_cache_key` | `TAILNET_WATCH_TOKEN_CACHE_KEY` | `tailscale_oauth_token` |
//! | `token_refresh_buffer_seconds` | `TAILNET_WATCH_TOKEN_REFRESH_BUFFER_SECONDS` | 300 |
//! | `status_auth_token` | `TAILNET_WATCH_STATUS_TOKEN` | none (open) |
//! | `poll_interval_seconds` | `TAILNET_WATCH_POLL_INTERVAL_SECONDS` | 60 |
//! | `store_path` | `TAILNET_WATCH_STORE_PATH` | `./data/status.sled` |
//! | `request_timeout_ms` | `TAILNET_WATCH_REQUEST_TIMEOUT_MS` | 10000 |
//! | `parallel` | `TAILNET_WATCH_PARALLEL` | false |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tailnet_watch_core::TagFilter;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Cannot read config file {path}: {reason}")]
    File { path: String, reason: String },

    #[error("Cannot parse config file {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Full agent configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub tailnet: String,
    pub oauth_client_id: String,
    pub oauth_client_secret: String,
    pub api_base_url: String,

    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub telegram_base_url: String,

    pub offline_threshold_minutes: u64,
    pub reminder_interval_minutes: u64,
    /// Comma-separated; empty monitors every device
    pub tag_filter: String,

    pub token_cache_key: String,
    pub token_refresh_buffer_seconds: u64,

    /// Shared secret for the status endpoint; `None` leaves it open
    pub status_auth_token: Option<String>,

    pub poll_interval_seconds: u64,
    pub store_path: PathBuf,
    pub request_timeout_ms: u64,
    pub parallel: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tailnet: "-".to_string(),
            oauth_client_id: String::new(),
            oauth_client_secret: String::new(),
            api_base_url: "https://api.tailscale.com".to_string(),
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            telegram_base_url: "https://api.telegram.org".to_string(),
            offline_threshold_minutes: 5,
            reminder_interval_minutes: 240,
            tag_filter: String::new(),
            token_cache_key: "tailscale_oauth_token".to_string(),
            token_refresh_buffer_seconds: 300,
            status_auth_token: None,
            poll_interval_seconds: 60,
            store_path: PathBuf::from("./data/status.sled"),
            request_timeout_ms: 10_000,
            parallel: false,
        }
    }
}

// Secrets stay out of logs
impl fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("tailnet", &self.tailnet)
            .field("api_base_url", &self.api_base_url)
            .field("telegram_base_url", &self.telegram_base_url)
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field("offline_threshold_minutes", &self.offline_threshold_minutes)
            .field("reminder_interval_minutes", &self.reminder_interval_minutes)
            .field("tag_filter", &self.tag_filter)
            .field("token_cache_key", &self.token_cache_key)
            .field("token_refresh_buffer_seconds", &self.token_refresh_buffer_seconds)
            .field("status_auth", &self.status_auth_token.is_some())
            .field("poll_interval_seconds", &self.poll_interval_seconds)
            .field("store_path", &self.store_path)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("parallel", &self.parallel)
            .finish_non_exhaustive()
    }
}

impl MonitorConfig {
    /// Load from `path` when given, otherwise from the environment, then validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Read settings from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: String| lookup(key).unwrap_or(default);

        Ok(Self {
            tailnet: text("TAILSCALE_TAILNET", defaults.tailnet),
            oauth_client_id: text("TAILSCALE_OAUTH_CLIENT_ID", defaults.oauth_client_id),
            oauth_client_secret: text("TAILSCALE_OAUTH_CLIENT_SECRET", defaults.oauth_client_secret),
            api_base_url: text("TAILSCALE_API_BASE_URL", defaults.api_base_url),
            telegram_bot_token: text("TELEGRAM_BOT_TOKEN", defaults.telegram_bot_token),
            telegram_chat_id: text("TELEGRAM_CHAT_ID", defaults.telegram_chat_id),
            telegram_base_url: text("TELEGRAM_API_BASE_URL", defaults.telegram_base_url),
            offline_threshold_minutes: parse(
                &lookup,
                "TAILNET_WATCH_OFFLINE_THRESHOLD_MINUTES",
                defaults.offline_threshold_minutes,
            )?,
            reminder_interval_minutes: parse(
                &lookup,
                "TAILNET_WATCH_REMINDER_INTERVAL_MINUTES",
                defaults.reminder_interval_minutes,
            )?,
            tag_filter: text("TAILNET_WATCH_TAG_FILTER", defaults.tag_filter),
            token_cache_key: text("TAILNET_WATCH_TOKEN_CACHE_KEY", defaults.token_cache_key),
            token_refresh_buffer_seconds: parse(
                &lookup,
                "TAILNET_WATCH_TOKEN_REFRESH_BUFFER_SECONDS",
                defaults.token_refresh_buffer_seconds,
            )?,
            status_auth_token: lookup("TAILNET_WATCH_STATUS_TOKEN"),
            poll_interval_seconds: parse(
                &lookup,
                "TAILNET_WATCH_POLL_INTERVAL_SECONDS",
                defaults.poll_interval_seconds,
            )?,
            store_path: lookup("TAILNET_WATCH_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            request_timeout_ms: parse(
                &lookup,
                "TAILNET_WATCH_REQUEST_TIMEOUT_MS",
                defaults.request_timeout_ms,
            )?,
            parallel: parse(&lookup, "TAILNET_WATCH_PARALLEL", defaults.parallel)?,
        })
    }

    /// Read settings from a YAML (`.yaml`/`.yml`) or TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: display.clone(),
            reason: e.to_string(),
        })?;

        let parse_error = |reason: String| ConfigError::Parse {
            path: display.clone(),
            reason,
        };

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))
            }
            Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
            _ => Err(parse_error("expected a .yaml, .yml or .toml file".to_string())),
        }
    }

    /// Check required settings and value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("oauth_client_id", &self.oauth_client_id),
            ("oauth_client_secret", &self.oauth_client_secret),
            ("telegram_bot_token", &self.telegram_bot_token),
            ("telegram_chat_id", &self.telegram_chat_id),
            ("tailnet", &self.tailnet),
            ("token_cache_key", &self.token_cache_key),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key));
            }
        }

        let positive = [
            ("offline_threshold_minutes", self.offline_threshold_minutes),
            ("reminder_interval_minutes", self.reminder_interval_minutes),
            ("poll_interval_seconds", self.poll_interval_seconds),
            ("request_timeout_ms", self.request_timeout_ms),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        for (key, url) in [
            ("api_base_url", &self.api_base_url),
            ("telegram_base_url", &self.telegram_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("not an http(s) URL: {}", url),
                });
            }
        }

        // A reminder can never fire inside a single cycle otherwise
        if self.reminder_interval_minutes.saturating_mul(60) < self.poll_interval_seconds {
            tracing::warn!(
                reminder_interval_minutes = self.reminder_interval_minutes,
                poll_interval_seconds = self.poll_interval_seconds,
                "Reminder interval is shorter than the poll interval"
            );
        }

        Ok(())
    }

    pub fn tag_filter(&self) -> TagFilter {
        TagFilter::parse(&self.tag_filter)
    }

    /// Status endpoint secret, treating an empty value as unset
    pub fn status_secret(&self) -> Option<&str> {
        self.status_auth_token
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
