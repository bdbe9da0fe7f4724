//! Shared fixtures: an in-process fake Bot API and a relay server bound to ephemeral ports.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use relay::config::{ChatPolicy, Config, RelaySettings};
use relay::server::{build_router, RelayState};
use relay::telegram::TelegramClient;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOKEN: &str = "123456789:TEST-token-for-relay";
pub const FIXED_CHAT: i64 = -1001234567890;

/// How the fake Bot API answers sendMessage.
#[derive(Clone, Copy)]
pub enum FakeReply {
    Ok,
    Reject(&'static str),
    Hang(Duration),
    NotJson,
}

/// One sendMessage call as the fake saw it: the `bot<token>` path segment and the JSON body.
#[derive(Debug, Clone)]
pub struct Hit {
    pub bot_segment: String,
    pub body: serde_json::Value,
}

#[derive(Clone)]
struct FakeState {
    reply: FakeReply,
    hits: Arc<Mutex<Vec<Hit>>>,
}

pub struct FakeTelegram {
    pub base_url: String,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl FakeTelegram {
    pub async fn start(reply: FakeReply) -> Self {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            reply,
            hits: hits.clone(),
        };
        let app = Router::new()
            .route("/:bot/sendMessage", post(fake_send_message))
            .with_state(state);
        let addr = spawn(app).await;
        Self {
            base_url: format!("http://{}", addr),
            hits,
        }
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().expect("hits lock").clone()
    }
}

async fn fake_send_message(
    State(state): State<FakeState>,
    Path(bot): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, String) {
    state.hits.lock().expect("hits lock").push(Hit {
        bot_segment: bot,
        body,
    });
    match state.reply {
        FakeReply::Ok => (
            StatusCode::OK,
            json!({ "ok": true, "result": { "message_id": 1 } }).to_string(),
        ),
        FakeReply::Reject(description) => (
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "error_code": 400, "description": description }).to_string(),
        ),
        FakeReply::Hang(delay) => {
            tokio::time::sleep(delay).await;
            (StatusCode::OK, json!({ "ok": true }).to_string())
        }
        FakeReply::NotJson => (StatusCode::BAD_GATEWAY, "<html>bad gateway</html>".to_string()),
    }
}

/// Serve `app` on an ephemeral loopback port. The task is left running when the test ends.
pub async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Settings with a token, a fixed chat, and the given policy, pointed at `api_base`.
pub fn settings(api_base: &str, policy: ChatPolicy) -> RelaySettings {
    let mut config = Config::default();
    config.relay.policy = policy;
    config.telegram.bot_token = Some(TOKEN.to_string());
    config.telegram.chat_id = Some(FIXED_CHAT.to_string());
    config.telegram.api_base = api_base.to_string();
    RelaySettings::resolve(&config, |_| None)
}

/// Start the relay with `settings` and return its `/api/bot` URL.
pub async fn start_relay(settings: RelaySettings) -> String {
    let client = TelegramClient::from_settings(&settings).expect("telegram client");
    let state = RelayState::new(settings, Arc::new(client), 0);
    let addr = spawn(build_router(state)).await;
    format!("http://{}{}", addr, relay::server::RELAY_PATH)
}
