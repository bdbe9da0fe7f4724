use clap::{Parser, Subcommand};
use relay::config::RelaySettings;
use relay::telegram::{MessageSender, SendOutcome, TelegramClient};

#[derive(Parser)]
#[command(name = "tg-relay")]
#[command(about = "Relay HTTP requests to the Telegram Bot API sendMessage method", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Write a default configuration file (leaves an existing one untouched).
    Init {
        /// Config file path (default: TG_RELAY_CONFIG_PATH or ~/.tg-relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the relay server. POST /api/bot forwards a message to Telegram.
    Serve {
        /// Config file path (default: TG_RELAY_CONFIG_PATH or ~/.tg-relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 8080)
        #[arg(long, short)]
        port: Option<u16>,

        /// Bind address (default from config or 127.0.0.1)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Send one message straight to the Bot API, bypassing the relay policy. Useful to check a token.
    Send {
        /// Config file path (default: TG_RELAY_CONFIG_PATH or ~/.tg-relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Destination chat id (default: the configured chat)
        #[arg(long, value_name = "ID", allow_hyphen_values = true)]
        chat_id: Option<i64>,

        /// Message text (HTML parse mode)
        text: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("tg-relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port, bind }) => {
            if let Err(e) = run_serve(config, port, bind).await {
                log::error!("server failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Send {
            config,
            chat_id,
            text,
        }) => {
            if let Err(e) = run_send(config, chat_id, text).await {
                log::error!("send failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(relay::config::default_config_path);
    if relay::init::init_config(&path)? {
        println!("wrote default configuration to {}", path.display());
    } else {
        println!("configuration already exists at {}", path.display());
    }
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
) -> anyhow::Result<()> {
    let (mut config, path) = relay::config::load_config(config_path)?;
    log::debug!("loaded config from {}", path.display());
    if let Some(p) = port {
        config.server.port = p;
    }
    if let Some(b) = bind {
        config.server.bind = b;
    }
    log::info!("starting relay on {}:{}", config.server.bind, config.server.port);
    relay::server::run_server(config).await
}

async fn run_send(
    config_path: Option<std::path::PathBuf>,
    chat_id: Option<i64>,
    text: String,
) -> anyhow::Result<()> {
    let (config, _) = relay::config::load_config(config_path)?;
    let settings = RelaySettings::from_env(&config);
    let token = settings
        .bot_token
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Bot token not configured (set TELEGRAM_BOT_TOKEN)"))?;
    let chat_id = match chat_id {
        Some(id) => id,
        None => settings
            .chat_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no --chat-id given and no chat id configured"))?
            .parse::<i64>()
            .map_err(|_| anyhow::anyhow!("configured chat id is not numeric"))?,
    };
    let client = TelegramClient::from_settings(&settings)?;
    match client.send_message(token, chat_id, &text).await? {
        SendOutcome::Delivered => {
            println!("sent");
            Ok(())
        }
        SendOutcome::Rejected { description } => {
            anyhow::bail!("telegram rejected the message: {}", description)
        }
    }
}
