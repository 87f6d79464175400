//! Application command definitions.

use super::types::{CommandDefinition, CommandOptionDefinition, OPTION_INTEGER};

/// Name of the link command.
pub const LINK_COMMAND: &str = "link";

/// Name of the link command's account option.
pub const LINK_USER_ID_OPTION: &str = "user_id";

/// `/link user_id:<int>`, available in guilds only.
#[must_use]
pub fn link_command() -> CommandDefinition {
    CommandDefinition {
        name: LINK_COMMAND.to_string(),
        description: "Link your Discord account to your WacoRP account".to_string(),
        options: vec![CommandOptionDefinition {
            kind: OPTION_INTEGER,
            name: LINK_USER_ID_OPTION.to_string(),
            description: "Your user ID from the launcher".to_string(),
            required: true,
            min_value: Some(1),
        }],
        contexts: vec![0],
    }
}

/// Every command the bot registers.
#[must_use]
pub fn all_commands() -> Vec<CommandDefinition> {
    vec![link_command()]
}
