//! Telegram Bot API contracts

use serde::{Deserialize, Serialize};

/// `sendMessage` request body
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    pub parse_mode: &'static str,
    pub disable_web_page_preview: bool,
}

impl<'a> SendMessageRequest<'a> {
    pub const PARSE_MODE: &'static str = "MarkdownV2";

    pub fn markdown(chat_id: &'a str, text: &'a str) -> Self {
        Self {
            chat_id,
            text,
            parse_mode: Self::PARSE_MODE,
            disable_web_page_preview: true,
        }
    }
}

/// Envelope of every Bot API response
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramResponse {
    pub ok: bool,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub error_code: Option<u16>,
}
