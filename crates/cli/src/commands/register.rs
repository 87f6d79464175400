//! Application command registration.
//!
//! The bot registers its commands on startup; this command does the same on
//! demand, e.g. to move the command from a test guild to global scope.
//!
//! # Environment Variables
//!
//! - `DISCORD_BOT_TOKEN`, `DISCORD_APPLICATION_ID`, `DISCORD_PUBLIC_KEY`
//! - `DISCORD_GUILD_ID` - Default registration guild (optional)
//! - `DISCORD_API_BASE` - REST base URL (optional)

use thiserror::Error;
use waco_verify_bot::config::{ConfigError, DiscordConfig};
use waco_verify_bot::discord::commands::all_commands;
use waco_verify_bot::discord::{ChatPlatform, DiscordClient, DiscordError};
use waco_verify_core::GuildId;

/// Where to register commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// `DISCORD_GUILD_ID` if set, global otherwise.
    Configured,
    Global,
    /// Raw guild ID from the command line.
    Guild(String),
}

/// Errors that can occur while registering commands.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid guild ID: {0}")]
    InvalidGuild(String),

    #[error("Discord error: {0}")]
    Discord(#[from] DiscordError),
}

/// Overwrite the application's commands in the requested scope.
///
/// # Errors
///
/// Returns `RegisterError` if configuration is incomplete or Discord refuses
/// the registration.
pub async fn run(scope: Scope) -> Result<(), RegisterError> {
    let mut config = DiscordConfig::from_env()?;
    config.guild_id = resolve(scope, config.guild_id)?;

    match config.guild_id {
        Some(guild) => tracing::info!("Registering commands in guild {guild}..."),
        None => tracing::info!("Registering global commands..."),
    }

    let client = DiscordClient::from_config(&config);
    let registered = client.register_commands(&all_commands()).await?;

    for command in &registered {
        tracing::info!("Registered /{}", command.name);
    }
    Ok(())
}

fn resolve(scope: Scope, configured: Option<GuildId>) -> Result<Option<GuildId>, RegisterError> {
    match scope {
        Scope::Configured => Ok(configured),
        Scope::Global => Ok(None),
        Scope::Guild(raw) => raw
            .parse::<GuildId>()
            .map(Some)
            .map_err(|_| RegisterError::InvalidGuild(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_resolution() {
        let configured = Some(GuildId::new(9));

        assert_eq!(resolve(Scope::Configured, configured).ok(), Some(configured));
        assert_eq!(resolve(Scope::Global, configured).ok(), Some(None));
        assert_eq!(
            resolve(Scope::Guild("42".to_string()), None).ok(),
            Some(Some(GuildId::new(42)))
        );
        assert!(matches!(
            resolve(Scope::Guild("abc".to_string()), None),
            Err(RegisterError::InvalidGuild(_))
        ));
    }
}
