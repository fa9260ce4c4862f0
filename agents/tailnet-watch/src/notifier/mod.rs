//! Outbound alert channel
//!
//! A [`Notifier`] never fails past its boundary: every outcome, including
//! transport errors, comes back as a [`Delivery`].

pub mod message;

pub use message::{escape_markdown, format_alert, format_duration, format_source_failure};

use std::fmt;
use std::time::Duration;

use crate::config::MonitorConfig;
use crate::contracts::{SendMessageRequest, TelegramResponse};

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: bool,
    pub error: Option<String>,
}

impl Delivery {
    pub fn delivered() -> Self {
        Self {
            delivered: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            delivered: false,
            error: Some(error.into()),
        }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Channel identifier for logs
    fn id(&self) -> &str;

    /// Deliver an already formatted MarkdownV2 message
    async fn send(&self, text: &str) -> Delivery;
}

/// Telegram Bot API notifier
pub struct TelegramNotifier {
    base_url: String,
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("base_url", &self.base_url)
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn new(
        base_url: impl Into<String>,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            client,
            timeout: Duration::from_millis(10_000),
        }
    }

    pub fn from_config(config: &MonitorConfig, client: reqwest::Client) -> Self {
        Self::new(
            &config.telegram_base_url,
            &config.telegram_bot_token,
            &config.telegram_chat_id,
            client,
        )
        .with_timeout(config.request_timeout())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    fn id(&self) -> &str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Delivery {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let request = SendMessageRequest::markdown(&self.chat_id, text);

        let response = match self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            // The URL carries the bot token; keep it out of the error text
            Err(e) => return Delivery::failed(format!("Network error: {}", e.without_url())),
        };

        let status = response.status();
        let body: Option<TelegramResponse> = response.json().await.ok();

        match body {
            Some(body) if body.ok && status.is_success() => Delivery::delivered(),
            Some(body) => Delivery::failed(
                body.description
                    .unwrap_or_else(|| format!("Telegram returned {}", status.as_u16())),
            ),
            None => Delivery::failed(format!(
                "Telegram returned {} with an unreadable body",
                status.as_u16()
            )),
        }
    }
}
