//! `PostgreSQL` implementation of [`LinkStore`].

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{instrument, warn};
use waco_verify_core::{
    AccountId, ChannelId, Decision, LinkApplicationId, MessageId, UserId,
};

use super::{BindOutcome, ClaimOutcome, LinkStore, RepositoryError, accounts, applications};
use crate::models::{Actor, LinkApplication, NewLinkApplication};

/// Link store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgLinkStore {
    pool: PgPool,
}

impl PgLinkStore {
    /// Create a new store using the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkStore for PgLinkStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(account_id = %id, user_id = %user))]
    async fn bind_account(
        &self,
        id: AccountId,
        user: UserId,
    ) -> Result<BindOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(mut account) = accounts::get_account_for_update(&mut *tx, id).await? else {
            return Ok(BindOutcome::NotFound);
        };

        if !account.can_bind(user) {
            return Ok(BindOutcome::AlreadyLinked);
        }

        let newly_bound = account.bound_identity().is_none();
        if newly_bound {
            accounts::set_discord_id(&mut *tx, id, user).await?;
            account.discord_id = Some(user.to_string());
        }

        tx.commit().await?;

        Ok(BindOutcome::Bound {
            account,
            newly_bound,
        })
    }

    async fn create_application(
        &self,
        new: NewLinkApplication,
    ) -> Result<LinkApplication, RepositoryError> {
        applications::insert_application(&self.pool, LinkApplicationId::generate(), &new).await
    }

    async fn attach_card(
        &self,
        id: LinkApplicationId,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), RepositoryError> {
        applications::update_card_info(&self.pool, id, channel_id, message_id).await
    }

    async fn discard_application(&self, id: LinkApplicationId) -> Result<bool, RepositoryError> {
        applications::delete_uncarded(&self.pool, id).await
    }

    async fn get_application(
        &self,
        id: LinkApplicationId,
    ) -> Result<Option<LinkApplication>, RepositoryError> {
        applications::get_application(&self.pool, id).await
    }

    async fn find_open_application(
        &self,
        account_id: AccountId,
        requester_id: UserId,
    ) -> Result<Option<LinkApplication>, RepositoryError> {
        applications::find_open_application(&self.pool, account_id, requester_id).await
    }

    #[instrument(skip(self, actor), fields(application_id = %id, %decision, actor_id = %actor.id))]
    async fn decide(
        &self,
        id: LinkApplicationId,
        decision: Decision,
        actor: &Actor,
    ) -> Result<ClaimOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let outcome = decision.outcome();
        let Some(application) =
            applications::claim_application(&mut *tx, id, outcome, actor).await?
        else {
            let status = applications::get_status(&mut *tx, id).await?;
            return Ok(match status {
                Some(status) => ClaimOutcome::AlreadyDecided(status),
                None => ClaimOutcome::NotFound,
            });
        };

        match decision {
            Decision::Approve => {
                let rows = accounts::set_accepted(&mut *tx, application.account_id).await?;
                if rows == 0 {
                    warn!(
                        account_id = %application.account_id,
                        "Approved application for an account that no longer exists"
                    );
                }
            }
            Decision::Reject => {
                // Already-deleted accounts are a resolved rejection.
                accounts::delete_account(&mut *tx, application.account_id).await?;
            }
        }

        tx.commit().await?;

        Ok(ClaimOutcome::Claimed(application))
    }

    async fn record_role_changes(
        &self,
        id: LinkApplicationId,
        changes: &[String],
    ) -> Result<(), RepositoryError> {
        applications::update_role_changes(&self.pool, id, changes).await
    }

    async fn mark_card_synced(&self, id: LinkApplicationId) -> Result<(), RepositoryError> {
        applications::mark_card_synced(&self.pool, id).await
    }

    async fn unsynced_decisions(
        &self,
        limit: i64,
    ) -> Result<Vec<LinkApplication>, RepositoryError> {
        applications::get_unsynced_decisions(&self.pool, limit).await
    }
}
