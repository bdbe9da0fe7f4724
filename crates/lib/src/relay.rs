//! Message relay handler.
//!
//! One request in, at most one Bot API call out. Checks run in a fixed order: method,
//! bot token, chat policy (including the init-id authorization), required fields. Only a
//! request that passes all of them reaches the [`MessageSender`].

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::config::{ChatPolicy, RelaySettings};
use crate::error::RelayError;
use crate::telegram::{MessageSender, SendOutcome};

/// A chat identifier as callers send it: a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChatRef {
    Number(serde_json::Number),
    Text(String),
}

impl ChatRef {
    /// Canonical string form, or None for values that count as missing (`0`, `""`).
    /// Whole numbers written as floats (`1.0`, `1e3`) canonicalize to their integer form.
    pub fn as_key(&self) -> Option<String> {
        match self {
            ChatRef::Number(n) if n.as_f64() == Some(0.0) => None,
            ChatRef::Number(n) => {
                let whole = n.as_i64().or_else(|| n.as_f64().and_then(whole_f64));
                Some(whole.map_or_else(|| n.to_string(), |i| i.to_string()))
            }
            ChatRef::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(t.to_string())
                }
            }
        }
    }
}

/// Relay request body. Which fields matter depends on the [`ChatPolicy`].
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    pub chat_id: Option<ChatRef>,
    pub chat_init_id: Option<ChatRef>,
    pub text: Option<String>,
}

impl SendRequest {
    /// Parse a request body. Each field is read on its own: a field of the wrong JSON type
    /// becomes None without affecting the others. An absent or malformed body is treated as
    /// empty, so it fails the required-field check instead of surfacing a parse error.
    pub fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        let value: serde_json::Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                log::debug!("relay: unparseable request body, treating as empty: {}", e);
                return Self::default();
            }
        };
        Self {
            chat_id: field(&value, "chat_id"),
            chat_init_id: field(&value, "chat_init_id"),
            text: field(&value, "text"),
        }
    }
}

/// One body field, or None when absent or not of type `T`.
fn field<T: DeserializeOwned>(body: &serde_json::Value, key: &str) -> Option<T> {
    let raw = body.get(key)?;
    match T::deserialize(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            log::debug!("relay: ignoring body field {}: {}", key, e);
            None
        }
    }
}

/// Integer value of a finite float with no fractional part that fits in i64.
fn whole_f64(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
    if f.is_finite() && f.fract() == 0.0 && f >= -LIMIT && f < LIMIT {
        Some(f as i64)
    } else {
        None
    }
}

/// Parse a chat id as Telegram's numeric form. Accepts integers and whole-number floats.
pub fn parse_chat_id(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(whole_f64))
}

/// Where and what to send, after policy and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target<'a> {
    pub chat_id: i64,
    pub text: &'a str,
}

/// Successful relay: 200 `{success: true, message: "sent"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sent;

impl IntoResponse for Sent {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "sent" })),
        )
            .into_response()
    }
}

/// Apply the chat policy and required-field checks to a parsed request.
pub fn resolve_target<'a>(
    settings: &RelaySettings,
    request: &'a SendRequest,
) -> Result<Target<'a>, RelayError> {
    let chat = match settings.policy {
        ChatPolicy::Caller => request.chat_id.as_ref().and_then(ChatRef::as_key),
        ChatPolicy::Fixed => settings.chat_id.clone(),
        ChatPolicy::AuthorizedFixed => {
            if let Some(ref expected) = settings.expected_init_id {
                let provided = request.chat_init_id.as_ref().and_then(ChatRef::as_key);
                if provided.as_deref() != Some(expected.as_str()) {
                    return Err(RelayError::Unauthorized);
                }
            }
            settings.chat_id.clone()
        }
    };
    let text = request.text.as_deref().filter(|t| !t.is_empty());
    let (Some(chat), Some(text)) = (chat, text) else {
        return Err(RelayError::missing_fields());
    };
    let Some(chat_id) = parse_chat_id(&chat) else {
        // A bad configured chat is the operator's fault, not the caller's.
        return Err(match settings.policy {
            ChatPolicy::Caller => {
                RelayError::ValidationFailed("chat_id must be numeric".to_string())
            }
            ChatPolicy::Fixed | ChatPolicy::AuthorizedFixed => RelayError::ConfigurationInvalid(
                "Configured chat_id is not numeric".to_string(),
            ),
        });
    };
    Ok(Target { chat_id, text })
}

/// Handle one relay request end to end.
pub async fn relay_message(
    settings: &RelaySettings,
    sender: &dyn MessageSender,
    method: &Method,
    body: &[u8],
) -> Result<Sent, RelayError> {
    if *method != Method::POST {
        return Err(RelayError::MethodNotAllowed);
    }
    let Some(token) = settings.bot_token.as_deref().filter(|t| !t.is_empty()) else {
        log::error!("relay: bot token not configured");
        return Err(RelayError::ConfigurationMissing);
    };

    let request = SendRequest::from_body(body);
    let target = match resolve_target(settings, &request) {
        Ok(t) => t,
        Err(e) => {
            log::info!("relay: rejected request: {}", e);
            return Err(e);
        }
    };

    log::debug!("relay: sending message to chat {}", target.chat_id);
    match sender.send_message(token, target.chat_id, target.text).await {
        Ok(SendOutcome::Delivered) => {
            log::info!("relay: message sent to chat {}", target.chat_id);
            Ok(Sent)
        }
        Ok(SendOutcome::Rejected { description }) => {
            log::warn!(
                "relay: telegram rejected message to chat {}: {}",
                target.chat_id,
                description
            );
            Err(RelayError::RemoteRejected(description))
        }
        Err(e) => {
            log::error!("relay: error sending message: {}", e);
            Err(RelayError::TransportFailure(e.to_string()))
        }
    }
}
