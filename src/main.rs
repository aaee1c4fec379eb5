//! bandit-term CLI
//!
//! `bandit-term` (or `bandit-term run`) opens the console; the other
//! subcommands inspect configuration and the level catalog.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use bandit_term::app::AppContext;
use bandit_term::config::ConfigStorage;
use bandit_term::console::Console;
use bandit_term::level::LevelCatalog;

/// Terminal front-end for the OverTheWire Bandit wargame
#[derive(Parser, Debug)]
#[command(name = "bandit-term", author, version, about)]
struct Args {
    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    log_stderr: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the interactive console (default)
    Run,

    /// Read or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print a level's goal, commands and reading material
    Level {
        /// Level number
        number: u32,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print a value, e.g. `ssh.port`
    Get { path: String },

    /// Set a value, e.g. `ssh.port 2221`
    Set { path: String, value: String },

    /// Restore every setting to its default
    Reset,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Run);

    // The console owns the terminal, so its logs go to a file
    let log_to_file = matches!(command, Command::Run) && !args.log_stderr;
    bandit_term::init_logging(log_to_file);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(dispatch(command));
    // A blocked stdin read would otherwise hold shutdown open
    runtime.shutdown_timeout(Duration::from_millis(200));
    result
}

async fn dispatch(command: Command) -> Result<()> {
    let storage = ConfigStorage::new().context("Cannot locate the configuration directory")?;

    match command {
        Command::Run => run_console(&storage).await,
        Command::Config { action } => config_command(&storage, action).await,
        Command::Level { number } => {
            let config = storage.load().await?;
            let catalog = LevelCatalog::load(config.levels.path.as_deref());
            println!("{}", catalog.format_level_info(number).trim_end());
            Ok(())
        }
    }
}

async fn run_console(storage: &ConfigStorage) -> Result<()> {
    info!("Starting bandit-term v{}", env!("CARGO_PKG_VERSION"));
    let ctx = AppContext::load(storage)
        .await
        .context("Failed to load application state")?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    Console::new(ctx, std::io::stdout())
        .run(stdin)
        .await
        .context("Console I/O failed")?;

    info!("bandit-term exited");
    Ok(())
}

async fn config_command(storage: &ConfigStorage, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Get { path } => {
            let config = storage.load().await?;
            let value = config.get_path(&path)?;
            match value {
                serde_json::Value::String(text) => println!("{}", text),
                other => println!("{}", serde_json::to_string_pretty(&other)?),
            }
        }
        ConfigAction::Set { path, value } => {
            let mut config = storage.load().await?;
            config.set_path(&path, &value)?;
            storage.save(&config).await?;
            println!("{} updated", path);
        }
        ConfigAction::Reset => {
            storage.reset_to_default().await?;
            println!("Configuration reset to defaults ({})", storage.path().display());
        }
    }
    Ok(())
}
