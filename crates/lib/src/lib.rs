//! tg-relay core library: configuration, the Telegram Bot API client, the relay handler,
//! and the HTTP server that hosts it.

pub mod config;
pub mod error;
pub mod init;
pub mod relay;
pub mod server;
pub mod telegram;
