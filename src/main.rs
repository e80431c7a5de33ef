//! Chat Companion - Entry Point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chat_companion::services::remote::adapters::telegram::TelegramAdapter;
use chat_companion::services::remote::adapters::RemoteAdapter;
use chat_companion::storage::ConfigService;
use chat_companion::AppState;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Chat-driven remote control for your own account.
#[derive(Parser, Debug)]
#[command(name = "chat-companion", version, about)]
struct Cli {
    /// Configuration file (default: ~/.chat-companion/config.json)
    #[arg(long, env = "COMPANION_CONFIG")]
    config: Option<PathBuf>,

    /// Write capture logs for failed commands and log at debug level
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug {
        "chat_companion=debug"
    } else {
        "chat_companion=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let service = ConfigService::load(cli.config.as_deref()).context("loading configuration")?;
    tracing::info!("[Config] Loaded {}", service.path().display());
    let mut config = service.into_config();
    if cli.debug {
        config.debug_mode = true;
    }

    let adapter = Arc::new(TelegramAdapter::new(&config.telegram)?);
    adapter
        .health_check()
        .await
        .context("connecting to Telegram")?;

    let state = AppState::new(config, adapter.clone())?;
    let gateway = Arc::new(state.into_gateway(adapter)?);
    let dispatch = gateway.clone().start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("[Gateway] Shutting down");
    gateway.stop().await?;
    dispatch.await?;
    Ok(())
}
