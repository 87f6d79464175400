//! Game account domain type.
//!
//! Mirrors the externally owned `users` table. This system only reads the
//! columns below and only writes `discord_id` and `accepted` (or deletes the
//! row on rejection).

use waco_verify_core::{AccountId, UserId};

/// A game account registered through the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// External numeric key.
    pub id: AccountId,
    /// In-game display name.
    pub username: String,
    /// Bound Discord user ID, stored as text by the launcher.
    pub discord_id: Option<String>,
    /// Whether staff accepted the account.
    pub accepted: bool,
    /// Roleplay history written at registration.
    pub rp_history: Option<String>,
    /// Base64 JSON appearance descriptor.
    pub skin_texture_value: Option<String>,
}

impl Account {
    /// The bound Discord identity, treating an empty string as unbound.
    #[must_use]
    pub fn bound_identity(&self) -> Option<&str> {
        self.discord_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Whether `user` may link this account.
    ///
    /// True when unbound or already bound to `user`.
    #[must_use]
    pub fn can_bind(&self, user: UserId) -> bool {
        self.bound_identity()
            .is_none_or(|bound| bound == user.to_string())
    }
}
