//! Run the relay bot.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

use herald_channels::{DiscordGateway, DiscordPlatform};
use herald_core::{BotToken, Config};

/// Arguments for `herald run`.
pub struct RunArgs {
    /// Config file path override.
    pub config: Option<PathBuf>,
    /// Enable debug logging.
    pub verbose: bool,
}

/// Load config, connect, and relay until shutdown.
pub async fn run_relay(args: RunArgs) -> anyhow::Result<()> {
    let path = args.config.unwrap_or_else(Config::default_path);
    let config = Config::load(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;

    let log_file = config.log_file();
    herald_core::logging::init(args.verbose, Some(log_file.as_path()))
        .context("opening log file")?;

    let token = BotToken::from_env().context("reading bot token")?;

    info!("starting herald");

    let platform = Arc::new(DiscordPlatform::new(token.clone()));
    let config = Arc::new(config);

    let (events_tx, events_rx) = mpsc::channel(64);
    let intake = tokio::spawn(DiscordGateway::new(token).run(events_tx));
    let relay = tokio::spawn(herald_relay::run(platform, Arc::clone(&config), events_rx));

    tokio::select! {
        result = intake => match result {
            Ok(Ok(())) => info!("gateway intake stopped"),
            Ok(Err(e)) => {
                error!(error = %e, "gateway failed");
                return Err(e.into());
            }
            Err(e) => {
                error!(error = %e, "gateway task failed");
                return Err(anyhow::anyhow!("gateway task failed"));
            }
        },
        _ = relay => {
            info!("event stream closed");
        }
        result = tokio::signal::ctrl_c() => {
            result.context("listening for shutdown signal")?;
            // Pending prompts keep their controls enabled; the platform
            // side is not cleaned up on shutdown.
            info!("shutting down");
        }
    }

    Ok(())
}
