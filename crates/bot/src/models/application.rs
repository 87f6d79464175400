//! Link application domain types.

use chrono::{DateTime, Utc};
use waco_verify_core::{
    AccountId, ApplicationStatus, ChannelId, LinkApplicationId, MessageId, RoleId, UserId,
};

/// A link application and the review card it is rendered on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkApplication {
    pub id: LinkApplicationId,
    /// Account being linked.
    pub account_id: AccountId,
    /// Discord user who ran `/link`.
    pub requester_id: UserId,
    pub requester_name: String,
    pub requester_avatar_url: Option<String>,
    /// Account display name at the time of the request.
    pub display_name: String,
    pub history: Option<String>,
    /// Decoded skin URL, if the descriptor was usable.
    pub skin_url: Option<String>,
    pub status: ApplicationStatus,
    /// Where the card was posted (unset until the post succeeds).
    pub channel_id: Option<ChannelId>,
    pub message_id: Option<MessageId>,
    pub decided_by_id: Option<UserId>,
    pub decided_by_name: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    /// Rendered role reconciliation lines for the decision field.
    pub role_changes: Vec<String>,
    /// Whether the card on Discord reflects `status`.
    pub card_synced: bool,
    pub created_at: DateTime<Utc>,
}

impl LinkApplication {
    /// Channel and message of the posted card, if any.
    #[must_use]
    pub const fn card_location(&self) -> Option<(ChannelId, MessageId)> {
        match (self.channel_id, self.message_id) {
            (Some(channel), Some(message)) => Some((channel, message)),
            _ => None,
        }
    }
}

/// Parameters for creating a pending application.
#[derive(Debug, Clone)]
pub struct NewLinkApplication {
    pub account_id: AccountId,
    pub requester_id: UserId,
    pub requester_name: String,
    pub requester_avatar_url: Option<String>,
    pub display_name: String,
    pub history: Option<String>,
    pub skin_url: Option<String>,
}

/// Outcome of a single role operation during approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleChange {
    Removed(RoleId),
    Granted(RoleId),
    /// The operation failed; the text is shown on the card.
    Warning(String),
}

impl RoleChange {
    /// Line rendered into the decision field.
    #[must_use]
    pub fn line(&self) -> String {
        match self {
            Self::Removed(role) => format!("🔻 Removed role: {}", role.mention()),
            Self::Granted(role) => format!("🔺 Granted role: {}", role.mention()),
            Self::Warning(text) => format!("⚠️ {text}"),
        }
    }

    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(self, Self::Warning(_))
    }
}
