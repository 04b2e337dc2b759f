//! Herald CLI - Discord announcement relay bot.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Herald - Discord announcement relay bot")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (defaults to ~/.herald/herald.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay bot
    Run,

    /// Probe the bot token and configured channels
    Status,

    /// Inspect the configuration
    Config {
        /// Validate the config and exit
        #[arg(long)]
        validate: bool,

        /// Print the loaded config
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        ui::info("Run 'herald run' to start the relay, or 'herald --help' for all commands.");
        return Ok(());
    };

    match command {
        Commands::Run => {
            let args = commands::run::RunArgs {
                config: cli.config,
                verbose: cli.verbose,
            };
            commands::run_relay(args).await?;
        }

        Commands::Status => {
            let args = commands::status::StatusArgs { config: cli.config };
            commands::run_status(args).await?;
        }

        Commands::Config { validate, show } => {
            let args = commands::config::ConfigArgs {
                config: cli.config,
                validate,
                show,
            };
            commands::run_config(args)?;
        }
    }

    Ok(())
}
