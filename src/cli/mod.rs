use clap::{Parser, Subcommand};
use std::path::PathBuf;
use warden::config::{default_config_path, WardenConfig};

pub mod check;
pub mod init;
pub mod logging;
pub mod reminder_status;
pub mod simulate;
pub mod version;

#[derive(Parser)]
#[command(name = "warden")]
#[command(author = "Warden Project")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for the Warden member verification service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a documented default configuration file
    Init {
        /// Path to config file (default: ~/.config/warden/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Path to the SQLite store recorded in the new config
        #[arg(long)]
        store_path: Option<String>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Classify a membership snapshot without changing anything
    Check {
        /// JSON snapshot of members
        #[arg(long)]
        members: String,

        /// Path to config file
        #[arg(long)]
        config: Option<String>,

        /// Evaluate as of this RFC 3339 time instead of now
        #[arg(long)]
        now: Option<String>,
    },

    /// Run one reconciliation and one reminder cycle against an in-memory platform
    Simulate {
        /// JSON snapshot of members
        #[arg(long)]
        members: String,

        /// Path to config file
        #[arg(long)]
        config: Option<String>,

        /// Answer the confirmation prompt with approval
        #[arg(long, conflicts_with = "deny")]
        approve: bool,

        /// Answer the confirmation prompt with denial
        #[arg(long)]
        deny: bool,
    },

    /// Show the stored reminder and when the next one is due
    ReminderStatus {
        /// Path to config file
        #[arg(long)]
        config: Option<String>,
    },

    /// Display version information
    Version,
}

/// Resolve `--config` against the default location and load it.
pub fn load_config(config: Option<String>) -> Result<(PathBuf, WardenConfig), Box<dyn std::error::Error>> {
    let path = config.map(PathBuf::from).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Err(format!(
            "Config file '{}' not found. Run `warden init` to create one.",
            path.display()
        )
        .into());
    }
    let config = WardenConfig::load(&path)?;
    Ok((path, config))
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Init {
            config,
            store_path,
            force,
        } => init::execute(config, store_path, force),
        Commands::Check {
            members,
            config,
            now,
        } => check::execute(members, config, now),
        Commands::Simulate {
            members,
            config,
            approve,
            deny,
        } => simulate::execute(members, config, approve, deny).await,
        Commands::ReminderStatus { config } => reminder_status::execute(config).await,
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
