//! Review card reconciliation.
//!
//! A decision is committed to the database before the card is edited. When
//! the edit fails, the row stays `card_synced = false` and this service
//! re-renders the card from the row on its next pass, so the card always
//! converges to the persisted decision.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::db::LinkStore;
use crate::discord::ChatPlatform;
use crate::discord::messages::render_card;
use crate::discord::types::{AllowedMentions, MessagePayload};
use crate::error::AppError;
use crate::models::LinkApplication;

/// Applications handled per pass.
const BATCH_SIZE: i64 = 50;

/// Renders cards from persisted applications and pushes them to Discord.
#[derive(Clone)]
pub struct CardReconciler {
    store: Arc<dyn LinkStore>,
    platform: Arc<dyn ChatPlatform>,
    skin_viewer_url: String,
}

impl CardReconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn LinkStore>,
        platform: Arc<dyn ChatPlatform>,
        skin_viewer_url: String,
    ) -> Self {
        Self {
            store,
            platform,
            skin_viewer_url,
        }
    }

    /// Edit the application's card to match its row.
    ///
    /// Returns whether the card now reflects the row. Failures are logged,
    /// never returned: the row remains the source of truth.
    #[instrument(skip(self, application), fields(application_id = %application.id))]
    pub async fn sync(&self, application: &LinkApplication) -> bool {
        let Some((channel_id, message_id)) = application.card_location() else {
            debug!("Application has no posted card");
            return false;
        };

        let (card, controls) = render_card(application, &self.skin_viewer_url);
        let payload = MessagePayload {
            embeds: Some(vec![card]),
            components: Some(vec![controls]),
            allowed_mentions: Some(AllowedMentions::none()),
            ..MessagePayload::default()
        };

        if let Err(e) = self
            .platform
            .edit_card(channel_id, message_id, payload)
            .await
        {
            warn!(error = %e, "Failed to update review card");
            return false;
        }

        if !application.status.is_terminal() {
            return true;
        }

        match self.store.mark_card_synced(application.id).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Card updated but sync flag not recorded");
                false
            }
        }
    }

    /// Re-render every decided card that is not yet in sync.
    ///
    /// Returns the number of cards brought in sync.
    ///
    /// # Errors
    ///
    /// Returns error if the unsynced applications cannot be listed.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<usize, AppError> {
        let pending = self.store.unsynced_decisions(BATCH_SIZE).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut synced = 0;
        for application in &pending {
            if self.sync(application).await {
                synced += 1;
            }
        }

        info!(
            synced,
            remaining = pending.len() - synced,
            "Card reconciliation pass complete"
        );
        Ok(synced)
    }

    /// Run [`Self::run_once`] every `interval` until the task is aborted.
    #[must_use]
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    error!(error = %e, "Card reconciliation pass failed");
                }
            }
        })
    }
}
