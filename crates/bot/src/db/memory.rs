//! In-memory implementation of [`LinkStore`].
//!
//! Holds accounts and applications in one map pair behind a single `RwLock`
//! so that bind and decide are atomic the same way the Postgres transactions
//! are. Used by tests and local demos; all state is lost on restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use waco_verify_core::{
    AccountId, ApplicationStatus, ChannelId, Decision, LinkApplicationId, MessageId, UserId,
};

use super::{BindOutcome, ClaimOutcome, LinkStore, RepositoryError};
use crate::models::{Account, Actor, LinkApplication, NewLinkApplication};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    applications: HashMap<LinkApplicationId, LinkApplication>,
}

/// In-memory link store.
#[derive(Debug, Default)]
pub struct InMemoryLinkStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryLinkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account, as the launcher would.
    pub async fn insert_account(&self, account: Account) {
        let mut tables = self.tables.write().await;
        tables.accounts.insert(account.id, account);
    }

    /// Snapshot of an account.
    pub async fn account(&self, id: AccountId) -> Option<Account> {
        self.tables.read().await.accounts.get(&id).cloned()
    }

    /// Snapshot of every application, oldest first.
    pub async fn applications(&self) -> Vec<LinkApplication> {
        let tables = self.tables.read().await;
        let mut all: Vec<_> = tables.applications.values().cloned().collect();
        all.sort_by_key(|app| app.created_at);
        all
    }

    /// Make every following operation fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl LinkStore for InMemoryLinkStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check_available()
    }

    async fn bind_account(
        &self,
        id: AccountId,
        user: UserId,
    ) -> Result<BindOutcome, RepositoryError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        let Some(account) = tables.accounts.get_mut(&id) else {
            return Ok(BindOutcome::NotFound);
        };

        if !account.can_bind(user) {
            return Ok(BindOutcome::AlreadyLinked);
        }

        let newly_bound = account.bound_identity().is_none();
        if newly_bound {
            account.discord_id = Some(user.to_string());
        }

        Ok(BindOutcome::Bound {
            account: account.clone(),
            newly_bound,
        })
    }

    async fn create_application(
        &self,
        new: NewLinkApplication,
    ) -> Result<LinkApplication, RepositoryError> {
        self.check_available()?;
        let application = LinkApplication {
            id: LinkApplicationId::generate(),
            account_id: new.account_id,
            requester_id: new.requester_id,
            requester_name: new.requester_name,
            requester_avatar_url: new.requester_avatar_url,
            display_name: new.display_name,
            history: new.history,
            skin_url: new.skin_url,
            status: ApplicationStatus::Pending,
            channel_id: None,
            message_id: None,
            decided_by_id: None,
            decided_by_name: None,
            decided_at: None,
            role_changes: Vec::new(),
            card_synced: false,
            created_at: Utc::now(),
        };

        let mut tables = self.tables.write().await;
        tables
            .applications
            .insert(application.id, application.clone());
        Ok(application)
    }

    async fn attach_card(
        &self,
        id: LinkApplicationId,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), RepositoryError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let application = tables
            .applications
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        application.channel_id = Some(channel_id);
        application.message_id = Some(message_id);
        Ok(())
    }

    async fn discard_application(&self, id: LinkApplicationId) -> Result<bool, RepositoryError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let uncarded = tables.applications.get(&id).is_some_and(|application| {
            application.status == ApplicationStatus::Pending && application.message_id.is_none()
        });
        if uncarded {
            tables.applications.remove(&id);
        }
        Ok(uncarded)
    }

    async fn get_application(
        &self,
        id: LinkApplicationId,
    ) -> Result<Option<LinkApplication>, RepositoryError> {
        self.check_available()?;
        Ok(self.tables.read().await.applications.get(&id).cloned())
    }

    async fn find_open_application(
        &self,
        account_id: AccountId,
        requester_id: UserId,
    ) -> Result<Option<LinkApplication>, RepositoryError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .applications
            .values()
            .filter(|app| {
                app.account_id == account_id
                    && app.requester_id == requester_id
                    && app.status == ApplicationStatus::Pending
                    && app.message_id.is_some()
            })
            .max_by_key(|app| app.created_at)
            .cloned())
    }

    async fn decide(
        &self,
        id: LinkApplicationId,
        decision: Decision,
        actor: &Actor,
    ) -> Result<ClaimOutcome, RepositoryError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        let Some(application) = tables.applications.get_mut(&id) else {
            return Ok(ClaimOutcome::NotFound);
        };

        let next = match application.status.decide(decision) {
            Ok(next) => next,
            Err(_) => return Ok(ClaimOutcome::AlreadyDecided(application.status)),
        };

        application.status = next;
        application.decided_by_id = Some(actor.id);
        application.decided_by_name = Some(actor.name.clone());
        application.decided_at = Some(Utc::now());
        let claimed = application.clone();

        match decision {
            Decision::Approve => {
                if let Some(account) = tables.accounts.get_mut(&claimed.account_id) {
                    account.accepted = true;
                }
            }
            Decision::Reject => {
                tables.accounts.remove(&claimed.account_id);
            }
        }

        Ok(ClaimOutcome::Claimed(claimed))
    }

    async fn record_role_changes(
        &self,
        id: LinkApplicationId,
        changes: &[String],
    ) -> Result<(), RepositoryError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if let Some(application) = tables.applications.get_mut(&id) {
            application.role_changes = changes.to_vec();
        }
        Ok(())
    }

    async fn mark_card_synced(&self, id: LinkApplicationId) -> Result<(), RepositoryError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if let Some(application) = tables.applications.get_mut(&id) {
            application.card_synced = true;
        }
        Ok(())
    }

    async fn unsynced_decisions(
        &self,
        limit: i64,
    ) -> Result<Vec<LinkApplication>, RepositoryError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut pending: Vec<_> = tables
            .applications
            .values()
            .filter(|app| app.status.is_terminal() && !app.card_synced && app.message_id.is_some())
            .cloned()
            .collect();
        pending.sort_by_key(|app| app.decided_at);
        pending.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(pending)
    }
}
