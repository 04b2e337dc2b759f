//! Configuration inspection.

use std::path::PathBuf;

use anyhow::Context;

use herald_core::Config;

use crate::ui;

/// Arguments for `herald config`.
pub struct ConfigArgs {
    /// Config file path override.
    pub config: Option<PathBuf>,
    /// Only validate, print nothing else.
    pub validate: bool,
    /// Print the loaded config.
    pub show: bool,
}

/// Validate and/or print the configuration.
pub fn run_config(args: ConfigArgs) -> anyhow::Result<()> {
    let path = args.config.unwrap_or_else(Config::default_path);
    let config = Config::load(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;

    if args.validate && !args.show {
        ui::success("config is valid");
        return Ok(());
    }

    ui::header("Herald config");
    ui::kv("config", &path.display().to_string());
    ui::kv("source channel", config.source_channel_id.as_ref());
    ui::kv("announce channel", config.announce_channel_id.as_ref());
    ui::kv("allowed role", config.allowed_role_id.as_ref());

    let timeout = config
        .prompt_deadline()
        .map_or_else(|| "never".to_string(), |d| format!("{}s", d.as_secs()));
    ui::kv("prompt timeout", &timeout);
    ui::kv("log file", &config.log_file().display().to_string());

    Ok(())
}
