//! Test doubles and fixtures.
//!
//! Compiled for unit tests and, through the `test-support` feature, for the
//! integration test crate.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::SecretString;
use waco_verify_core::{
    AccountId, ChannelId, DiscordApplicationId, GuildId, MessageId, RoleId, UserId,
};

use crate::config::{
    BotConfig, DEFAULT_DISCORD_API_BASE, DEFAULT_SKIN_VIEWER_URL, DiscordConfig, ReviewConfig,
};
use crate::discord::types::{CommandDefinition, RegisteredCommand, User};
use crate::discord::{ChatPlatform, DiscordError, GuildMember, Message, MessagePayload};
use crate::models::{Account, Actor, Requester};

pub const REVIEW_CHANNEL: ChannelId = ChannelId::new(1_000);
pub const GUILD: GuildId = GuildId::new(2_000);
pub const MODERATOR_ROLE: RoleId = RoleId::new(10);
pub const ADMIN_ROLE: RoleId = RoleId::new(20);
pub const NOVICE_ROLE: RoleId = RoleId::new(30);
pub const MEMBER_ROLE: RoleId = RoleId::new(40);

/// Review identifiers used throughout the tests.
#[must_use]
pub const fn review_config() -> ReviewConfig {
    ReviewConfig {
        channel_id: REVIEW_CHANNEL,
        moderator_role_id: MODERATOR_ROLE,
        admin_role_id: ADMIN_ROLE,
        novice_role_id: NOVICE_ROLE,
        member_role_id: MEMBER_ROLE,
    }
}

/// Configuration for tests, verifying signatures with `public_key_hex`.
#[must_use]
pub fn test_config(public_key_hex: &str) -> BotConfig {
    BotConfig {
        database_url: SecretString::from("postgres://localhost/waco_verify_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        discord: DiscordConfig {
            bot_token: SecretString::from("test-token"),
            public_key: public_key_hex.to_string(),
            application_id: DiscordApplicationId::new(100),
            api_base: DEFAULT_DISCORD_API_BASE.to_string(),
            guild_id: Some(GUILD),
        },
        review: review_config(),
        skin_viewer_url: DEFAULT_SKIN_VIEWER_URL.to_string(),
        reconcile_interval: Duration::from_secs(60),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
        tls: None,
    }
}

/// An unbound, unaccepted account.
#[must_use]
pub fn account(id: i64, username: &str, history: Option<&str>) -> Account {
    Account {
        id: AccountId::new(id),
        username: username.to_string(),
        discord_id: None,
        accepted: false,
        rp_history: history.map(String::from),
        skin_texture_value: None,
    }
}

#[must_use]
pub fn requester(id: u64) -> Requester {
    Requester {
        id: UserId::new(id),
        display_name: format!("user-{id}"),
        avatar_url: None,
    }
}

#[must_use]
pub fn moderator(id: u64) -> Actor {
    Actor {
        id: UserId::new(id),
        name: format!("mod-{id}"),
        roles: Some(vec![MODERATOR_ROLE]),
    }
}

#[must_use]
pub fn bystander(id: u64) -> Actor {
    Actor {
        id: UserId::new(id),
        name: format!("user-{id}"),
        roles: Some(vec![NOVICE_ROLE]),
    }
}

/// Operations whose failure can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    PostCard,
    EditCard,
    GetMember,
    AddRole,
    RemoveRole,
    DirectMessage,
    Followup,
    RegisterCommands,
}

/// A call made against [`RecordingPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    PostCard {
        channel_id: ChannelId,
        payload: MessagePayload,
    },
    EditCard {
        channel_id: ChannelId,
        message_id: MessageId,
        payload: MessagePayload,
    },
    GetMember {
        guild_id: GuildId,
        user_id: UserId,
    },
    AddRole {
        user_id: UserId,
        role_id: RoleId,
        reason: String,
    },
    RemoveRole {
        user_id: UserId,
        role_id: RoleId,
        reason: String,
    },
    DirectMessage {
        user_id: UserId,
        content: String,
    },
    Followup {
        token: String,
        payload: MessagePayload,
    },
    RegisterCommands(Vec<String>),
}

/// In-memory [`ChatPlatform`] that records every call.
#[derive(Debug, Default)]
pub struct RecordingPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    members: Mutex<HashMap<UserId, Vec<RoleId>>>,
    failures: Mutex<HashMap<Operation, StatusCode>>,
    delays: Mutex<HashMap<Operation, Duration>>,
    closed_dms: Mutex<HashSet<UserId>>,
    next_message_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicU64::new(5_000),
            ..Self::default()
        }
    }

    /// Put a user in the guild with the given roles.
    pub fn add_member(&self, user_id: UserId, roles: Vec<RoleId>) {
        lock(&self.members).insert(user_id, roles);
    }

    /// Current roles of a guild member.
    #[must_use]
    pub fn member_roles(&self, user_id: UserId) -> Option<Vec<RoleId>> {
        lock(&self.members).get(&user_id).cloned()
    }

    /// Make `operation` fail with `status` until cleared.
    pub fn fail(&self, operation: Operation, status: StatusCode) {
        lock(&self.failures).insert(operation, status);
    }

    /// Hold every `operation` call for `delay` before it completes.
    pub fn delay(&self, operation: Operation, delay: Duration) {
        lock(&self.delays).insert(operation, delay);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Refuse DMs to this user.
    pub fn close_dms(&self, user_id: UserId) {
        lock(&self.closed_dms).insert(user_id);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<PlatformCall> {
        lock(&self.calls).clone()
    }

    /// Payloads of every posted card.
    #[must_use]
    pub fn posted_cards(&self) -> Vec<MessagePayload> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::PostCard { payload, .. } => Some(payload),
                _ => None,
            })
            .collect()
    }

    /// Payloads of every card edit.
    #[must_use]
    pub fn edited_cards(&self) -> Vec<MessagePayload> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::EditCard { payload, .. } => Some(payload),
                _ => None,
            })
            .collect()
    }

    /// Follow-ups sent for one interaction token.
    #[must_use]
    pub fn followups(&self, token: &str) -> Vec<MessagePayload> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Followup {
                    token: sent_to,
                    payload,
                } if sent_to == token => Some(payload),
                _ => None,
            })
            .collect()
    }

    /// Number of role additions and removals.
    #[must_use]
    pub fn role_mutations(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    PlatformCall::AddRole { .. } | PlatformCall::RemoveRole { .. }
                )
            })
            .count()
    }

    fn record(&self, call: PlatformCall) {
        lock(&self.calls).push(call);
    }

    async fn pause(&self, operation: Operation) {
        let delay = lock(&self.delays).get(&operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self, operation: Operation) -> Result<(), DiscordError> {
        match lock(&self.failures).get(&operation) {
            Some(&status) => Err(DiscordError::Api {
                status,
                message: format!("injected {operation:?} failure"),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn post_card(
        &self,
        channel_id: ChannelId,
        payload: MessagePayload,
    ) -> Result<Message, DiscordError> {
        self.record(PlatformCall::PostCard {
            channel_id,
            payload,
        });
        self.pause(Operation::PostCard).await;
        self.check(Operation::PostCard)?;
        Ok(Message {
            id: MessageId::new(self.next_message_id.fetch_add(1, Ordering::SeqCst)),
            channel_id,
            embeds: Vec::new(),
        })
    }

    async fn edit_card(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        payload: MessagePayload,
    ) -> Result<(), DiscordError> {
        self.record(PlatformCall::EditCard {
            channel_id,
            message_id,
            payload,
        });
        self.pause(Operation::EditCard).await;
        self.check(Operation::EditCard)
    }

    async fn get_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<GuildMember>, DiscordError> {
        self.record(PlatformCall::GetMember { guild_id, user_id });
        self.pause(Operation::GetMember).await;
        self.check(Operation::GetMember)?;
        Ok(self.member_roles(user_id).map(|roles| GuildMember {
            user: Some(User {
                id: user_id,
                username: format!("user-{user_id}"),
                global_name: None,
                avatar: None,
            }),
            nick: None,
            roles,
        }))
    }

    async fn add_member_role(
        &self,
        _guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> Result<(), DiscordError> {
        self.record(PlatformCall::AddRole {
            user_id,
            role_id,
            reason: reason.to_string(),
        });
        self.pause(Operation::AddRole).await;
        self.check(Operation::AddRole)?;
        if let Some(roles) = lock(&self.members).get_mut(&user_id)
            && !roles.contains(&role_id)
        {
            roles.push(role_id);
        }
        Ok(())
    }

    async fn remove_member_role(
        &self,
        _guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> Result<(), DiscordError> {
        self.record(PlatformCall::RemoveRole {
            user_id,
            role_id,
            reason: reason.to_string(),
        });
        self.pause(Operation::RemoveRole).await;
        self.check(Operation::RemoveRole)?;
        if let Some(roles) = lock(&self.members).get_mut(&user_id) {
            roles.retain(|role| *role != role_id);
        }
        Ok(())
    }

    async fn send_direct_message(
        &self,
        user_id: UserId,
        content: &str,
    ) -> Result<(), DiscordError> {
        self.record(PlatformCall::DirectMessage {
            user_id,
            content: content.to_string(),
        });
        self.pause(Operation::DirectMessage).await;
        self.check(Operation::DirectMessage)?;
        if lock(&self.closed_dms).contains(&user_id) {
            return Err(DiscordError::Api {
                status: StatusCode::FORBIDDEN,
                message: "Cannot send messages to this user (code 50007)".to_string(),
            });
        }
        Ok(())
    }

    async fn send_followup(
        &self,
        interaction_token: &str,
        payload: MessagePayload,
    ) -> Result<(), DiscordError> {
        self.record(PlatformCall::Followup {
            token: interaction_token.to_string(),
            payload,
        });
        self.pause(Operation::Followup).await;
        self.check(Operation::Followup)
    }

    async fn register_commands(
        &self,
        commands: &[CommandDefinition],
    ) -> Result<Vec<RegisteredCommand>, DiscordError> {
        let names: Vec<String> = commands.iter().map(|c| c.name.clone()).collect();
        self.record(PlatformCall::RegisterCommands(names.clone()));
        self.pause(Operation::RegisterCommands).await;
        self.check(Operation::RegisterCommands)?;
        Ok(names
            .into_iter()
            .map(|name| RegisteredCommand { name })
            .collect())
    }
}
