//! Database access for the verification workflow.
//!
//! # Tables
//!
//! - `users` - Game accounts, owned by the launcher. Read through a fixed
//!   typed interface; only `discord_id` and `accepted` are written, and rows
//!   are deleted on rejection.
//! - `link_applications` - Review cards and their decision state (owned).
//!
//! # Migrations
//!
//! Migrations are stored in `crates/bot/migrations/` and run via:
//! ```bash
//! cargo run -p waco-verify-cli -- migrate
//! ```

pub mod accounts;
pub mod applications;
pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use waco_verify_core::{
    AccountId, ApplicationStatus, ChannelId, Decision, LinkApplicationId, MessageId, UserId,
};

pub use memory::InMemoryLinkStore;
pub use postgres::PgLinkStore;

use crate::models::{Account, Actor, LinkApplication, NewLinkApplication};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

/// Result of binding a Discord identity to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// The account is now bound to the requester.
    Bound {
        account: Account,
        /// False when the account was already bound to the same identity.
        newly_bound: bool,
    },
    /// The account is bound to a different identity. Nothing was written.
    AlreadyLinked,
    /// No account has this key.
    NotFound,
}

/// Result of claiming an application for a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller won the claim; the account mutation is committed.
    Claimed(LinkApplication),
    /// Another decision was recorded first. Nothing was written.
    AlreadyDecided(ApplicationStatus),
    /// No application has this ID.
    NotFound,
}

/// Storage operations used by the link and review workflow.
///
/// Every operation is a short transaction; nothing is held open across
/// requests.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Check connectivity.
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// Bind `user` to the account unless it is bound to someone else.
    async fn bind_account(
        &self,
        id: AccountId,
        user: UserId,
    ) -> Result<BindOutcome, RepositoryError>;

    /// Persist a new pending application.
    async fn create_application(
        &self,
        new: NewLinkApplication,
    ) -> Result<LinkApplication, RepositoryError>;

    /// Record where the application's card was posted.
    async fn attach_card(
        &self,
        id: LinkApplicationId,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), RepositoryError>;

    /// Delete a pending application whose card was never posted.
    ///
    /// Returns whether a row was removed; carded or decided applications are
    /// left alone.
    async fn discard_application(&self, id: LinkApplicationId) -> Result<bool, RepositoryError>;

    /// Get an application by ID.
    async fn get_application(
        &self,
        id: LinkApplicationId,
    ) -> Result<Option<LinkApplication>, RepositoryError>;

    /// Latest pending application with a posted card for this pair.
    async fn find_open_application(
        &self,
        account_id: AccountId,
        requester_id: UserId,
    ) -> Result<Option<LinkApplication>, RepositoryError>;

    /// Atomically move a pending application to the decision's outcome and
    /// apply the account mutation (approve: `accepted = true`; reject: delete
    /// the account if it still exists).
    async fn decide(
        &self,
        id: LinkApplicationId,
        decision: Decision,
        actor: &Actor,
    ) -> Result<ClaimOutcome, RepositoryError>;

    /// Store the rendered role reconciliation lines.
    async fn record_role_changes(
        &self,
        id: LinkApplicationId,
        changes: &[String],
    ) -> Result<(), RepositoryError>;

    /// Mark the card as reflecting the persisted decision.
    async fn mark_card_synced(&self, id: LinkApplicationId) -> Result<(), RepositoryError>;

    /// Decided applications whose card still shows the pending state.
    async fn unsynced_decisions(&self, limit: i64)
    -> Result<Vec<LinkApplication>, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
