//! Staff decisions on review cards.
//!
//! A decision runs as a saga:
//! 1. Guard: the actor must hold a staff role
//! 2. Claim the application and mutate the account in one transaction
//! 3. Approve only: reconcile the applicant's roles
//! 4. Edit the card; on failure the reconciler retries later
//! 5. Best-effort DM to the applicant
//!
//! Only step 2 can refuse the decision. Everything after it is reported on
//! the card or in the logs.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use waco_verify_core::{
    ApplicationControl, ApplicationStatus, Decision, GuildId, LinkApplicationId,
};

use super::reconciler::CardReconciler;
use crate::config::ReviewConfig;
use crate::db::{ClaimOutcome, LinkStore, RepositoryError};
use crate::discord::messages;
use crate::discord::{ChatPlatform, DiscordError};
use crate::models::{Actor, LinkApplication, RoleChange};

/// Errors that can refuse a decision.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("actor lacks a staff role")]
    AuthorizationDenied,

    #[error("application {0} not found")]
    ApplicationNotFound(LinkApplicationId),

    #[error("application already {0}")]
    AlreadyDecided(ApplicationStatus),

    #[error("persistence failure: {0}")]
    Persistence(#[from] RepositoryError),
}

impl DecisionError {
    /// Private reply for the actor. Never includes internal detail.
    #[must_use]
    pub fn user_message(&self, decision: Decision) -> String {
        match self {
            Self::AuthorizationDenied => messages::DECISION_DENIED.to_string(),
            Self::ApplicationNotFound(_) => messages::DECISION_MISSING_APPLICATION.to_string(),
            Self::AlreadyDecided(status) => messages::decision_already_made(*status),
            Self::Persistence(_) => messages::decision_failed(decision).to_string(),
        }
    }
}

/// Result of an effective decision.
#[derive(Debug, Clone)]
pub struct DecisionReport {
    pub application: LinkApplication,
    pub role_changes: Vec<RoleChange>,
    /// Whether the card was edited to show the decision.
    pub card_updated: bool,
    /// Whether the applicant received the DM.
    pub applicant_notified: bool,
}

/// Authorizes and applies staff decisions.
#[derive(Clone)]
pub struct DecisionService {
    store: Arc<dyn LinkStore>,
    platform: Arc<dyn ChatPlatform>,
    review: ReviewConfig,
    cards: CardReconciler,
    /// Guild used for role changes when the interaction carries none.
    default_guild_id: Option<GuildId>,
}

impl DecisionService {
    #[must_use]
    pub fn new(
        store: Arc<dyn LinkStore>,
        platform: Arc<dyn ChatPlatform>,
        review: ReviewConfig,
        cards: CardReconciler,
        default_guild_id: Option<GuildId>,
    ) -> Self {
        Self {
            store,
            platform,
            review,
            cards,
            default_guild_id,
        }
    }

    /// Check that the actor holds the moderator or admin role.
    ///
    /// # Errors
    ///
    /// Returns `DecisionError::AuthorizationDenied` otherwise, including for
    /// interactions from outside a guild.
    pub fn authorize(&self, actor: &Actor) -> Result<(), DecisionError> {
        if actor.holds_any(&self.review.staff_roles()) {
            Ok(())
        } else {
            Err(DecisionError::AuthorizationDenied)
        }
    }

    /// Apply a decision button click.
    ///
    /// # Errors
    ///
    /// Returns `DecisionError` if the actor is not staff, the application is
    /// unknown or already decided, or the decision cannot be persisted. In
    /// every error case nothing was mutated.
    #[instrument(
        skip(self, actor),
        fields(
            actor_id = %actor.id,
            decision = %control.decision,
            application_id = %control.application_id
        )
    )]
    pub async fn decide(
        &self,
        actor: &Actor,
        control: ApplicationControl,
        guild_id: Option<GuildId>,
    ) -> Result<DecisionReport, DecisionError> {
        self.authorize(actor)?;

        let mut application = match self
            .store
            .decide(control.application_id, control.decision, actor)
            .await?
        {
            ClaimOutcome::Claimed(application) => application,
            ClaimOutcome::AlreadyDecided(status) => {
                info!(%status, "Decision refused, application already decided");
                return Err(DecisionError::AlreadyDecided(status));
            }
            ClaimOutcome::NotFound => {
                return Err(DecisionError::ApplicationNotFound(control.application_id));
            }
        };

        info!(account_id = %application.account_id, "Decision recorded");

        let role_changes = match control.decision {
            Decision::Approve => {
                let changes = self
                    .reconcile_roles(&application, actor, guild_id.or(self.default_guild_id))
                    .await;
                let lines: Vec<String> = changes.iter().map(RoleChange::line).collect();
                if !lines.is_empty()
                    && let Err(e) = self.store.record_role_changes(application.id, &lines).await
                {
                    warn!(error = %e, "Role change lines not recorded");
                }
                application.role_changes = lines;
                changes
            }
            Decision::Reject => Vec::new(),
        };

        let card_updated = self.cards.sync(&application).await;
        if card_updated {
            application.card_synced = true;
        }

        let applicant_notified = self.notify_applicant(&application, actor, control.decision).await;

        Ok(DecisionReport {
            application,
            role_changes,
            card_updated,
            applicant_notified,
        })
    }

    /// Swap the novice role for the member role.
    ///
    /// Each call is independent; failures become warning lines. A member who
    /// left the guild skips reconciliation entirely. When the member lookup
    /// itself fails the novice role is left alone and the grant is still
    /// attempted.
    async fn reconcile_roles(
        &self,
        application: &LinkApplication,
        actor: &Actor,
        guild_id: Option<GuildId>,
    ) -> Vec<RoleChange> {
        let Some(guild_id) = guild_id else {
            warn!("No guild for role reconciliation, skipping");
            return Vec::new();
        };

        let user_id = application.requester_id;
        let mut changes = Vec::with_capacity(2);
        let member = match self.platform.get_member(guild_id, user_id).await {
            Ok(Some(member)) => Some(member),
            Ok(None) => {
                info!(%user_id, "Applicant not in guild, skipping role changes");
                return Vec::new();
            }
            Err(e) => {
                changes.push(role_warning(&e));
                None
            }
        };

        let reason = messages::approval_audit_reason(&actor.name);

        let novice = self.review.novice_role_id;
        if member.is_some_and(|member| member.has_role(novice)) {
            changes.push(
                match self
                    .platform
                    .remove_member_role(guild_id, user_id, novice, &reason)
                    .await
                {
                    Ok(()) => RoleChange::Removed(novice),
                    Err(e) => role_warning(&e),
                },
            );
        }

        let granted = self.review.member_role_id;
        changes.push(
            match self
                .platform
                .add_member_role(guild_id, user_id, granted, &reason)
                .await
            {
                Ok(()) => RoleChange::Granted(granted),
                Err(e) => role_warning(&e),
            },
        );

        changes
    }

    /// Fire-and-forget DM; the outcome is only logged.
    async fn notify_applicant(
        &self,
        application: &LinkApplication,
        actor: &Actor,
        decision: Decision,
    ) -> bool {
        let content =
            messages::applicant_notice(decision, &application.display_name, &actor.name);
        match self
            .platform
            .send_direct_message(application.requester_id, &content)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Applicant DM not delivered");
                false
            }
        }
    }
}

fn role_warning(error: &DiscordError) -> RoleChange {
    warn!(error = %error, "Role change failed");
    if error.is_forbidden() {
        RoleChange::Warning("Could not change roles (missing permissions)".to_string())
    } else {
        RoleChange::Warning(format!("Role change error: {error}"))
    }
}
