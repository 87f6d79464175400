//! Discord-side participants of the workflow.

use waco_verify_core::{RoleId, UserId};

/// The user running `/link`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: UserId,
    /// Name shown as the card author (nick, global name or username).
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// The staff member pressing a decision button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    /// Account username, used in audit reasons and DMs.
    pub name: String,
    /// Guild roles. `None` when the interaction did not come from a guild.
    pub roles: Option<Vec<RoleId>>,
}

impl Actor {
    /// Whether the actor holds any of `roles` in the current guild.
    #[must_use]
    pub fn holds_any(&self, roles: &[RoleId]) -> bool {
        self.roles
            .as_ref()
            .is_some_and(|held| held.iter().any(|role| roles.contains(role)))
    }
}
