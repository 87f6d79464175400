//! Discord integration for account verification.
//!
//! This module provides:
//! - [`DiscordClient`] for the REST API (cards, roles, DMs, commands)
//! - [`ChatPlatform`], the seam the services depend on
//! - [`InteractionVerifier`] for Ed25519 request signatures
//! - Wire types and review card builders
//!
//! # Flow
//!
//! 1. A user runs `/link`; Discord POSTs a signed interaction to the bot
//! 2. The account is bound and a review card is posted to the staff channel
//! 3. A moderator clicks Approve or Reject on the card
//! 4. The interaction is verified, the decision is claimed and persisted
//! 5. Roles are reconciled and the card is updated with the result

pub mod client;
pub mod commands;
pub mod error;
pub mod messages;
pub mod platform;
pub mod signature;
pub mod types;

pub use client::DiscordClient;
pub use error::DiscordError;
pub use platform::ChatPlatform;
pub use signature::{InteractionVerifier, SignatureError};
pub use types::{
    ActionRow, Embed, GuildMember, Interaction, InteractionResponse, InteractionType, Message,
    MessagePayload, User,
};
