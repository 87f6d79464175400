//! Waco Verify CLI - Database migrations and bot maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run bot database migrations
//! wv-cli migrate
//!
//! # Register the /link command (guild-scoped when DISCORD_GUILD_ID is set)
//! wv-cli register-commands
//!
//! # Re-render decided cards whose edit failed
//! wv-cli reconcile
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `register-commands` - Overwrite the bot's application commands
//! - `reconcile` - One card reconciliation pass

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "wv-cli")]
#[command(author, version, about = "Waco Verify CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Register application commands with Discord
    RegisterCommands {
        /// Register in this guild instead of `DISCORD_GUILD_ID`
        #[arg(short, long)]
        guild: Option<String>,

        /// Register globally even if `DISCORD_GUILD_ID` is set
        #[arg(long, conflicts_with = "guild")]
        global: bool,
    },
    /// Run one card reconciliation pass
    Reconcile,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::RegisterCommands { guild, global } => {
            let scope = if global {
                commands::register::Scope::Global
            } else {
                guild.map_or(commands::register::Scope::Configured, |id| {
                    commands::register::Scope::Guild(id)
                })
            };
            commands::register::run(scope).await?;
        }
        Commands::Reconcile => commands::reconcile::run().await?,
    }
    Ok(())
}
