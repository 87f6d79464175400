//! The chat platform operations the workflow depends on.

use async_trait::async_trait;
use waco_verify_core::{ChannelId, GuildId, MessageId, RoleId, UserId};

use super::error::DiscordError;
use super::types::{CommandDefinition, GuildMember, Message, MessagePayload, RegisteredCommand};

/// Chat platform surface used by the services.
///
/// [`super::DiscordClient`] is the production implementation; tests use a
/// recording double.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Post a review card to a channel.
    async fn post_card(
        &self,
        channel_id: ChannelId,
        payload: MessagePayload,
    ) -> Result<Message, DiscordError>;

    /// Replace the embeds and components of a posted card.
    async fn edit_card(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        payload: MessagePayload,
    ) -> Result<(), DiscordError>;

    /// Look up a guild member. `Ok(None)` when the user is not in the guild.
    async fn get_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<GuildMember>, DiscordError>;

    /// Grant a role, recording `reason` in the audit log.
    async fn add_member_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> Result<(), DiscordError>;

    /// Remove a role, recording `reason` in the audit log.
    async fn remove_member_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> Result<(), DiscordError>;

    /// Send a direct message to a user.
    async fn send_direct_message(&self, user_id: UserId, content: &str)
    -> Result<(), DiscordError>;

    /// Send a follow-up message for an interaction.
    async fn send_followup(
        &self,
        interaction_token: &str,
        payload: MessagePayload,
    ) -> Result<(), DiscordError>;

    /// Replace the registered application commands.
    async fn register_commands(
        &self,
        commands: &[CommandDefinition],
    ) -> Result<Vec<RegisteredCommand>, DiscordError>;
}
