//! Relay error taxonomy.
//!
//! Every variant ends the request. [`RelayError`] renders itself as the HTTP status and
//! JSON body the caller sees; transport detail stays in the server log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Body text for transport failures. The underlying error is logged, never returned.
pub const GENERIC_SERVER_ERROR: &str = "server error";

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Bot token not configured")]
    ConfigurationMissing,

    /// Server-side settings present but unusable (e.g. a non-numeric fixed chat id).
    #[error("{0}")]
    ConfigurationInvalid(String),

    #[error("Unauthorized: chat_init_id does not match")]
    Unauthorized,

    /// Missing or malformed request fields; the message is returned as-is.
    #[error("{0}")]
    ValidationFailed(String),

    /// The Bot API answered `ok: false`; carries its `description`.
    #[error("{0}")]
    RemoteRejected(String),

    /// Network, timeout, or undecodable Bot API response.
    #[error("transport failure: {0}")]
    TransportFailure(String),
}

impl RelayError {
    pub fn missing_fields() -> Self {
        RelayError::ValidationFailed("Missing chat_id or text".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::ConfigurationMissing => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::ConfigurationInvalid(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Unauthorized => StatusCode::FORBIDDEN,
            RelayError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            RelayError::RemoteRejected(_) => StatusCode::BAD_REQUEST,
            RelayError::TransportFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body for the caller. Errors raised before the outbound call carry only `error`;
    /// outcomes of the call also carry `success: false`.
    pub fn body(&self) -> serde_json::Value {
        match self {
            RelayError::RemoteRejected(description) => {
                json!({ "success": false, "error": description })
            }
            RelayError::TransportFailure(_) => {
                json!({ "success": false, "error": GENERIC_SERVER_ERROR })
            }
            other => json!({ "error": other.to_string() }),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
