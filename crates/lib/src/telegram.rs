//! Telegram Bot API client: sendMessage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::RelaySettings;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

/// Bot API envelope. Only `ok` and `description` matter to the relay.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// What the Bot API said about a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Rejected { description: String },
}

/// The send never produced a Bot API verdict. Messages never contain the request URL.
#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("building http client: {0}")]
    Client(String),

    #[error("sendMessage request failed: {0}")]
    Transport(String),

    #[error("sendMessage response could not be decoded: {0}")]
    Decode(String),
}

/// Sends one text message. The relay handler talks to the Bot API only through this trait.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(
        &self,
        token: &str,
        chat_id: i64,
        text: &str,
    ) -> Result<SendOutcome, TelegramError>;
}

/// reqwest-backed Bot API client. Cheap to clone; the connection pool is shared.
#[derive(Clone)]
pub struct TelegramClient {
    api_base: String,
    parse_mode: String,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(api_base: &str, parse_mode: &str, timeout: Duration) -> Result<Self, TelegramError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelegramError::Client(e.to_string()))?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            parse_mode: parse_mode.to_string(),
            client,
        })
    }

    pub fn from_settings(settings: &RelaySettings) -> Result<Self, TelegramError> {
        Self::new(&settings.api_base, &settings.parse_mode, settings.timeout)
    }

    fn method_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, token, method)
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send_message(
        &self,
        token: &str,
        chat_id: i64,
        text: &str,
    ) -> Result<SendOutcome, TelegramError> {
        let url = self.method_url(token, "sendMessage");
        let body = SendMessageRequest {
            chat_id,
            text,
            parse_mode: &self.parse_mode,
        };
        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TelegramError::Transport(e.without_url().to_string()))?;
        // Rejections arrive as 4xx with a JSON envelope, so the status alone decides nothing.
        let status = res.status();
        let data: ApiResponse = res
            .json()
            .await
            .map_err(|e| TelegramError::Decode(format!("{} (status {})", e.without_url(), status)))?;
        if data.ok {
            Ok(SendOutcome::Delivered)
        } else {
            Ok(SendOutcome::Rejected {
                description: data
                    .description
                    .unwrap_or_else(|| "Telegram API request failed".to_string()),
            })
        }
    }
}

/// Mask a bot token for logging: first 7 chars + `***` + last 4 chars.
/// Tokens of 11 chars or fewer are fully masked.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let len = chars.len();
    if len <= 11 {
        return "***".to_string();
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[len - 4..].iter().collect();
    format!("{}***{}", head, tail)
}
