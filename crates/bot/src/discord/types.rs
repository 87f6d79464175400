//! Discord API wire types.
//!
//! These types cover the subset of the interactions and REST payloads needed
//! for the link command and review cards. Numeric type tags are kept as raw
//! integers on the wire and exposed through small enums.
//!
//! See: <https://discord.com/developers/docs/interactions/receiving-and-responding>

use serde::{Deserialize, Serialize};
use waco_verify_core::{
    ChannelId, DiscordApplicationId, GuildId, MessageId, RoleId, UserId,
};

/// Discord CDN base URL for avatars.
const CDN_BASE: &str = "https://cdn.discordapp.com";

/// Ephemeral message flag (`1 << 6`).
pub const EPHEMERAL_FLAG: u64 = 1 << 6;

// =============================================================================
// Incoming interactions
// =============================================================================

/// Interaction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionType {
    Ping,
    ApplicationCommand,
    MessageComponent,
    Other(u8),
}

impl From<u8> for InteractionType {
    fn from(code: u8) -> Self {
        match code {
            1 => Self::Ping,
            2 => Self::ApplicationCommand,
            3 => Self::MessageComponent,
            other => Self::Other(other),
        }
    }
}

/// Interaction payload POSTed to the interactions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    pub application_id: DiscordApplicationId,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub data: Option<InteractionData>,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    /// Present when invoked in a guild.
    #[serde(default)]
    pub member: Option<GuildMember>,
    /// Present when invoked in a DM.
    #[serde(default)]
    pub user: Option<User>,
    /// Continuation token for follow-up messages.
    pub token: String,
    /// Message the component is attached to.
    #[serde(default)]
    pub message: Option<Message>,
}

impl Interaction {
    #[must_use]
    pub fn interaction_type(&self) -> InteractionType {
        InteractionType::from(self.kind)
    }

    /// The invoking user, whether in a guild or a DM.
    #[must_use]
    pub fn invoker(&self) -> Option<&User> {
        self.member
            .as_ref()
            .and_then(|m| m.user.as_ref())
            .or(self.user.as_ref())
    }

    /// Slash command name, if this is a command.
    #[must_use]
    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.name.as_deref())
    }

    /// Component custom ID, if this is a component interaction.
    #[must_use]
    pub fn custom_id(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.custom_id.as_deref())
    }

    /// Integer option value by name.
    #[must_use]
    pub fn integer_option(&self, name: &str) -> Option<i64> {
        self.data
            .as_ref()?
            .options
            .iter()
            .find(|opt| opt.name == name)?
            .value
            .as_ref()?
            .as_i64()
    }
}

/// Data of a command or component interaction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionData {
    /// Command name.
    #[serde(default)]
    pub name: Option<String>,
    /// Command options.
    #[serde(default)]
    pub options: Vec<CommandOptionValue>,
    /// Component custom ID.
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub component_type: Option<u8>,
}

/// A submitted command option.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandOptionValue {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// Discord user.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl User {
    /// Global display name, falling back to the username.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }

    /// Avatar URL, or the default avatar for users without one.
    #[must_use]
    pub fn avatar_url(&self) -> String {
        match &self.avatar {
            Some(hash) => format!("{CDN_BASE}/avatars/{}/{hash}.png", self.id),
            None => format!(
                "{CDN_BASE}/embed/avatars/{}.png",
                (self.id.get() >> 22) % 6
            ),
        }
    }
}

/// Guild member, as delivered in interactions and by `GET /guilds/{id}/members/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildMember {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

impl GuildMember {
    #[must_use]
    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }

    /// Guild nickname, then global name, then username.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.nick
            .as_deref()
            .or_else(|| self.user.as_ref().map(User::display_name))
    }
}

/// Message returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

/// DM channel returned by `POST /users/@me/channels`.
#[derive(Debug, Clone, Deserialize)]
pub struct DmChannel {
    pub id: ChannelId,
}

/// Error body returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub message: String,
}

// =============================================================================
// Embeds and components
// =============================================================================

/// Rich embed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    /// ISO 8601 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

impl EmbedField {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Action row component (type 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    pub components: Vec<Button>,
}

impl ActionRow {
    #[must_use]
    pub const fn new(components: Vec<Button>) -> Self {
        Self {
            kind: 1,
            components,
        }
    }
}

/// Button style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

impl ButtonStyle {
    const fn code(self) -> u8 {
        match self {
            Self::Primary => 1,
            Self::Secondary => 2,
            Self::Success => 3,
            Self::Danger => 4,
        }
    }
}

impl Serialize for ButtonStyle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Button component (type 2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    kind: u8,
    pub style: ButtonStyle,
    pub label: String,
    pub custom_id: String,
    pub disabled: bool,
}

impl Button {
    #[must_use]
    pub fn new(style: ButtonStyle, label: impl Into<String>, custom_id: impl Into<String>) -> Self {
        Self {
            kind: 2,
            style,
            label: label.into(),
            custom_id: custom_id.into(),
            disabled: false,
        }
    }

    #[must_use]
    pub const fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// Controls which mentions in `content` actually ping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllowedMentions {
    /// Mention types parsed from content (`roles`, `users`, `everyone`).
    pub parse: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleId>,
}

impl AllowedMentions {
    /// Suppress every mention.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Allow only the given roles to be pinged.
    #[must_use]
    pub fn roles(roles: impl IntoIterator<Item = RoleId>) -> Self {
        Self {
            parse: Vec::new(),
            roles: roles.into_iter().collect(),
        }
    }
}

// =============================================================================
// Outgoing messages
// =============================================================================

/// Message body used for creating and editing messages, interaction
/// callbacks and follow-ups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<Embed>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ActionRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_mentions: Option<AllowedMentions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl MessagePayload {
    /// Plain text visible only to the invoking user.
    #[must_use]
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            allowed_mentions: Some(AllowedMentions::none()),
            flags: Some(EPHEMERAL_FLAG),
            ..Self::default()
        }
    }

    /// Plain text without pings.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            allowed_mentions: Some(AllowedMentions::none()),
            ..Self::default()
        }
    }
}

/// Response to an incoming interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<MessagePayload>,
}

impl InteractionResponse {
    /// `PONG` (type 1).
    #[must_use]
    pub const fn pong() -> Self {
        Self {
            kind: 1,
            data: None,
        }
    }

    /// `CHANNEL_MESSAGE_WITH_SOURCE` (type 4) with an ephemeral message.
    #[must_use]
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            kind: 4,
            data: Some(MessagePayload::ephemeral(content)),
        }
    }

    /// `DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE` (type 5), visible only to the
    /// invoking user. The answer follows as a follow-up message.
    #[must_use]
    pub fn deferred_ephemeral() -> Self {
        Self {
            kind: 5,
            data: Some(MessagePayload {
                flags: Some(EPHEMERAL_FLAG),
                ..MessagePayload::default()
            }),
        }
    }

    /// `DEFERRED_UPDATE_MESSAGE` (type 6): acknowledge a component click and
    /// edit the message later.
    #[must_use]
    pub const fn deferred_update() -> Self {
        Self {
            kind: 6,
            data: None,
        }
    }
}

// =============================================================================
// Application commands
// =============================================================================

/// Command option type: integer.
pub const OPTION_INTEGER: u8 = 4;

/// Application command definition for registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOptionDefinition>,
    /// Interaction contexts (0 = guild).
    pub contexts: Vec<u8>,
}

/// Command option definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOptionDefinition {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,
}

/// Registered command returned by the bulk overwrite endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredCommand {
    pub name: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_command_interaction() {
        let json = r#"{
            "id": "1",
            "application_id": "100",
            "type": 2,
            "token": "tok",
            "guild_id": "200",
            "channel_id": "300",
            "member": {
                "user": {"id": "555", "username": "nova", "global_name": "Nova", "avatar": null},
                "nick": null,
                "roles": ["10", "20"]
            },
            "data": {
                "id": "9",
                "name": "link",
                "type": 1,
                "options": [{"name": "user_id", "type": 4, "value": 42}]
            }
        }"#;

        let interaction: Interaction = serde_json::from_str(json).unwrap();
        assert_eq!(
            interaction.interaction_type(),
            InteractionType::ApplicationCommand
        );
        assert_eq!(interaction.command_name(), Some("link"));
        assert_eq!(interaction.integer_option("user_id"), Some(42));
        assert_eq!(interaction.invoker().unwrap().id, UserId::new(555));
        let member = interaction.member.unwrap();
        assert!(member.has_role(RoleId::new(20)));
        assert_eq!(member.display_name(), Some("Nova"));
    }

    #[test]
    fn test_deserialize_component_interaction() {
        let json = r#"{
            "application_id": "100",
            "type": 3,
            "token": "tok",
            "data": {"custom_id": "application:approve:abc", "component_type": 2},
            "message": {"id": "400", "channel_id": "300"}
        }"#;

        let interaction: Interaction = serde_json::from_str(json).unwrap();
        assert_eq!(
            interaction.interaction_type(),
            InteractionType::MessageComponent
        );
        assert_eq!(interaction.custom_id(), Some("application:approve:abc"));
        assert_eq!(interaction.message.unwrap().id, MessageId::new(400));
    }

    #[test]
    fn test_unknown_interaction_type() {
        assert_eq!(InteractionType::from(5), InteractionType::Other(5));
    }

    #[test]
    fn test_ephemeral_response_serialization() {
        let json = serde_json::to_value(InteractionResponse::ephemeral("hi")).unwrap();
        assert_eq!(json["type"], 4);
        assert_eq!(json["data"]["content"], "hi");
        assert_eq!(json["data"]["flags"], 64);
        assert_eq!(json["data"]["allowed_mentions"]["parse"], serde_json::json!([]));
    }

    #[test]
    fn test_pong_and_deferred_have_no_data() {
        let pong = serde_json::to_value(InteractionResponse::pong()).unwrap();
        assert_eq!(pong, serde_json::json!({"type": 1}));
        let deferred = serde_json::to_value(InteractionResponse::deferred_update()).unwrap();
        assert_eq!(deferred, serde_json::json!({"type": 6}));
    }

    #[test]
    fn test_deferred_ephemeral_carries_only_flags() {
        let json = serde_json::to_value(InteractionResponse::deferred_ephemeral()).unwrap();
        assert_eq!(json, serde_json::json!({"type": 5, "data": {"flags": 64}}));
    }

    #[test]
    fn test_button_serialization() {
        let row = ActionRow::new(vec![
            Button::new(ButtonStyle::Success, "Approve", "a").disabled(true),
        ]);
        let json = serde_json::to_value(row).unwrap();
        assert_eq!(json["type"], 1);
        assert_eq!(json["components"][0]["type"], 2);
        assert_eq!(json["components"][0]["style"], 3);
        assert_eq!(json["components"][0]["disabled"], true);
    }

    #[test]
    fn test_default_avatar_url() {
        let user = User {
            id: UserId::new(80_351_110_224_678_912),
            username: "nelly".to_string(),
            global_name: None,
            avatar: None,
        };
        assert_eq!(user.display_name(), "nelly");
        let expected = (80_351_110_224_678_912_u64 >> 22) % 6;
        assert_eq!(
            user.avatar_url(),
            format!("https://cdn.discordapp.com/embed/avatars/{expected}.png")
        );
    }
}
