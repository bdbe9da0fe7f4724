//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.tg-relay/config.json`) and environment.
//! Environment values override the file. The result is resolved once at startup into
//! [`RelaySettings`], which the relay handler reads but never mutates.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::telegram::mask_token;

pub const ENV_CONFIG_PATH: &str = "TG_RELAY_CONFIG_PATH";
pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_CHAT_INIT_ID: &str = "TELEGRAM_CHAT_INIT_ID";
pub const ENV_API_BASE: &str = "TELEGRAM_API_BASE";

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Bot API credentials and target chat.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// How the relay picks the destination chat.
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Bind address and port for the relay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port (default 8080).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_port() -> u16 {
    8080
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

/// Telegram settings. Every secret here can be overridden from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    /// Fixed destination chat. Overridden by TELEGRAM_CHAT_ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    /// Value callers must send as `chat_init_id` under the `authorizedFixed` policy. Overridden by TELEGRAM_CHAT_INIT_ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_init_id: Option<String>,
    /// Bot API base URL. Overridden by TELEGRAM_API_BASE (used by tests and self-hosted Bot API servers).
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Outbound request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// `parse_mode` sent with every message.
    #[serde(default = "default_parse_mode")]
    pub parse_mode: String,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_parse_mode() -> String {
    "HTML".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            expected_init_id: None,
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
            parse_mode: default_parse_mode(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    #[serde(default)]
    pub policy: ChatPolicy,
}

/// Which chat a relayed message goes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatPolicy {
    /// Send to the `chat_id` in the request body.
    Caller,
    /// Ignore the body and always send to the configured chat.
    Fixed,
    /// Check `chat_init_id` against the configured expected id (when one is set), then send to the configured chat.
    #[default]
    AuthorizedFixed,
}

impl ChatPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatPolicy::Caller => "caller",
            ChatPolicy::Fixed => "fixed",
            ChatPolicy::AuthorizedFixed => "authorizedFixed",
        }
    }
}

/// Settings the relay handler runs with. Built once at startup, shared read-only.
#[derive(Clone)]
pub struct RelaySettings {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub expected_init_id: Option<String>,
    pub policy: ChatPolicy,
    pub api_base: String,
    pub timeout: Duration,
    pub parse_mode: String,
}

impl RelaySettings {
    /// Resolve settings from config and the process environment.
    pub fn from_env(config: &Config) -> Self {
        Self::resolve(config, |key| std::env::var(key).ok())
    }

    /// Resolve settings from config, taking overrides from `lookup` (an environment lookup).
    pub fn resolve<F>(config: &Config, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let tg = &config.telegram;
        let pick = |key: &str, fallback: Option<&String>| {
            non_empty(lookup(key).as_deref()).or_else(|| non_empty(fallback.map(String::as_str)))
        };
        let api_base = pick(ENV_API_BASE, Some(&tg.api_base))
            .unwrap_or_else(default_api_base)
            .trim_end_matches('/')
            .to_string();
        Self {
            bot_token: pick(ENV_BOT_TOKEN, tg.bot_token.as_ref()),
            chat_id: pick(ENV_CHAT_ID, tg.chat_id.as_ref()),
            expected_init_id: pick(ENV_CHAT_INIT_ID, tg.expected_init_id.as_ref()),
            policy: config.relay.policy,
            api_base,
            timeout: Duration::from_secs(tg.timeout_secs.max(1)),
            parse_mode: non_empty(Some(tg.parse_mode.as_str())).unwrap_or_else(default_parse_mode),
        }
    }
}

impl fmt::Debug for RelaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelaySettings")
            .field("bot_token", &self.bot_token.as_deref().map(mask_token))
            .field("chat_id", &self.chat_id)
            .field("expected_init_id", &self.expected_init_id.as_ref().map(|_| "***"))
            .field("policy", &self.policy)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .field("parse_mode", &self.parse_mode)
            .finish()
    }
}

/// Trimmed value, or None when absent or blank.
fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH).map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".tg-relay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, or the default path (or TG_RELAY_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.relay.policy, ChatPolicy::AuthorizedFixed);

        let settings = RelaySettings::resolve(&config, env(&[]));
        assert!(settings.bot_token.is_none());
        assert_eq!(settings.api_base, DEFAULT_API_BASE);
        assert_eq!(settings.timeout, Duration::from_secs(10));
        assert_eq!(settings.parse_mode, "HTML");
    }

    #[test]
    fn parses_camel_case_file() {
        let config: Config = serde_json::from_str(
            r#"{
                "server": { "port": 9000 },
                "telegram": { "botToken": "file-token", "chatId": "42", "expectedInitId": "7", "timeoutSecs": 3 },
                "relay": { "policy": "caller" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.relay.policy, ChatPolicy::Caller);

        let settings = RelaySettings::resolve(&config, env(&[]));
        assert_eq!(settings.bot_token.as_deref(), Some("file-token"));
        assert_eq!(settings.chat_id.as_deref(), Some("42"));
        assert_eq!(settings.expected_init_id.as_deref(), Some("7"));
        assert_eq!(settings.timeout, Duration::from_secs(3));
    }

    #[test]
    fn env_overrides_file() {
        let mut config = Config::default();
        config.telegram.bot_token = Some("file-token".into());
        config.telegram.chat_id = Some("1".into());
        let settings = RelaySettings::resolve(
            &config,
            env(&[
                (ENV_BOT_TOKEN, " env-token "),
                (ENV_CHAT_ID, "2"),
                (ENV_API_BASE, "http://127.0.0.1:9/"),
            ]),
        );
        assert_eq!(settings.bot_token.as_deref(), Some("env-token"));
        assert_eq!(settings.chat_id.as_deref(), Some("2"));
        assert_eq!(settings.api_base, "http://127.0.0.1:9");
    }

    #[test]
    fn blank_values_count_as_absent() {
        let mut config = Config::default();
        config.telegram.bot_token = Some("   ".into());
        config.telegram.chat_id = Some("5".into());
        let settings = RelaySettings::resolve(&config, env(&[(ENV_CHAT_ID, "")]));
        assert!(settings.bot_token.is_none());
        assert_eq!(settings.chat_id.as_deref(), Some("5"));
    }

    #[test]
    fn debug_output_masks_secrets() {
        let mut config = Config::default();
        config.telegram.bot_token = Some("123456789:AAHsecretsecretsecret".into());
        config.telegram.expected_init_id = Some("init-secret".into());
        let settings = RelaySettings::resolve(&config, env(&[]));
        let printed = format!("{:?}", settings);
        assert!(!printed.contains("secretsecret"));
        assert!(!printed.contains("init-secret"));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let path = std::env::temp_dir().join("tg-relay-config-test-does-not-exist.json");
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.server.port, 8080);
    }
}
