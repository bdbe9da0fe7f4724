//! Relay HTTP server: health route plus the relay route, on a single port.

use crate::config::{ChatPolicy, Config, RelaySettings};
use crate::relay;
use crate::telegram::{mask_token, MessageSender, TelegramClient};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::Method,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Path the relay handler is mounted on.
pub const RELAY_PATH: &str = "/api/bot";

/// Shared, read-only state for every request.
#[derive(Clone)]
pub struct RelayState {
    pub settings: Arc<RelaySettings>,
    pub sender: Arc<dyn MessageSender>,
    /// Port reported by the health route.
    pub port: u16,
}

impl RelayState {
    pub fn new(settings: RelaySettings, sender: Arc<dyn MessageSender>, port: u16) -> Self {
        Self {
            settings: Arc::new(settings),
            sender,
            port,
        }
    }
}

/// Routes: `GET /` health, `/api/bot` relay. The relay route accepts every method so that
/// non-POST requests get the JSON 405 body instead of the router's empty one.
pub fn build_router(state: RelayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route(RELAY_PATH, any(relay_http))
        .with_state(state)
}

/// Resolve settings, bind, and serve until SIGINT/SIGTERM.
pub async fn run_server(config: Config) -> Result<()> {
    let settings = RelaySettings::from_env(&config);
    match settings.bot_token.as_deref() {
        Some(token) => log::info!("telegram bot token configured: {}", mask_token(token)),
        None => log::warn!("TELEGRAM_BOT_TOKEN not set; relay requests will fail with 500"),
    }
    log::info!("relay policy: {}", settings.policy.as_str());
    if let Some(problem) = chat_config_problem(&settings) {
        log::warn!("{}", problem);
    }

    let client = TelegramClient::from_settings(&settings).context("creating telegram client")?;
    let state = RelayState::new(settings, Arc::new(client), config.server.port);
    let app = build_router(state);

    let bind_addr = format!("{}:{}", config.server.bind.trim(), config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("relay listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("relay server exited")?;
    log::info!("relay stopped");
    Ok(())
}

/// Describe a fixed-chat misconfiguration that would fail every relay request, if any.
pub fn chat_config_problem(settings: &RelaySettings) -> Option<String> {
    if settings.policy == ChatPolicy::Caller {
        return None;
    }
    match settings.chat_id.as_deref() {
        None => Some(format!(
            "TELEGRAM_CHAT_ID not set; policy {} will reject every request with 400",
            settings.policy.as_str()
        )),
        Some(chat) if relay::parse_chat_id(chat).is_none() => Some(format!(
            "configured chat id {:?} is not numeric; relay requests will fail with 500",
            chat
        )),
        Some(_) => None,
    }
}

/// Completes on SIGINT or SIGTERM. In-flight requests are drained by axum; an abandoned
/// outbound call is simply dropped.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// `/api/bot` — relay one message to Telegram.
async fn relay_http(State(state): State<RelayState>, method: Method, body: Bytes) -> Response {
    match relay::relay_message(&state.settings, state.sender.as_ref(), &method, &body).await {
        Ok(sent) => sent.into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET / returns a simple health JSON.
async fn health_http(State(state): State<RelayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
        "policy": state.settings.policy.as_str(),
        "tokenConfigured": state.settings.bot_token.is_some(),
    }))
}
