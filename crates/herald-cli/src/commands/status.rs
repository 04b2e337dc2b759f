//! Connectivity probe: token and configured channels.

use std::path::PathBuf;

use anyhow::Context;

use herald_channels::{DiscordPlatform, Platform};
use herald_core::{BotToken, Config};

use crate::ui;

/// Arguments for `herald status`.
pub struct StatusArgs {
    /// Config file path override.
    pub config: Option<PathBuf>,
}

/// Probe the token and both configured channels.
pub async fn run_status(args: StatusArgs) -> anyhow::Result<()> {
    ui::header("Herald status");

    let path = args.config.unwrap_or_else(Config::default_path);
    let config = Config::load(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    ui::kv("config", &path.display().to_string());

    let token = match BotToken::from_env() {
        Ok(token) => token,
        Err(e) => {
            ui::error(&format!("bot token: {e}"));
            return Ok(());
        }
    };

    let platform = DiscordPlatform::new(token);

    match platform.current_user().await {
        Ok(me) => ui::success(&format!("logged in as {}", me.username)),
        Err(e) => {
            ui::error(&format!("login failed: {e}"));
            return Ok(());
        }
    }

    let channels = [
        ("source channel", &config.source_channel_id),
        ("announce channel", &config.announce_channel_id),
    ];
    for (label, id) in channels {
        match platform.fetch_channel(id).await {
            Ok(info) => {
                let name = info.name.unwrap_or_else(|| id.to_string());
                ui::success(&format!("{label}: #{name}"));
            }
            Err(e) => ui::error(&format!("{label} ({id}): {e}")),
        }
    }

    Ok(())
}
