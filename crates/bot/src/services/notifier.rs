//! Posts review cards for new link applications.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, instrument, warn};
use waco_verify_core::skin_url_from_descriptor;

use crate::config::ReviewConfig;
use crate::db::{LinkStore, RepositoryError};
use crate::discord::messages::{render_card, staff_ping};
use crate::discord::types::{AllowedMentions, MessagePayload};
use crate::discord::{ChatPlatform, DiscordError};
use crate::models::{Account, LinkApplication, NewLinkApplication, Requester};

/// Errors that can occur while posting an application.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("could not persist application: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("could not post review card: {0}")]
    Delivery(#[from] DiscordError),
}

/// Builds and posts review cards to the staff channel.
#[derive(Clone)]
pub struct ApplicationNotifier {
    store: Arc<dyn LinkStore>,
    platform: Arc<dyn ChatPlatform>,
    review: ReviewConfig,
    skin_viewer_url: String,
}

impl ApplicationNotifier {
    #[must_use]
    pub fn new(
        store: Arc<dyn LinkStore>,
        platform: Arc<dyn ChatPlatform>,
        review: ReviewConfig,
        skin_viewer_url: String,
    ) -> Self {
        Self {
            store,
            platform,
            review,
            skin_viewer_url,
        }
    }

    /// Persist a pending application for `account` and post its card.
    ///
    /// An undecodable appearance descriptor only drops the skin preview.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` if the application cannot be stored or the card
    /// cannot be posted. An application whose card was not posted is deleted.
    #[instrument(skip(self, account, requester), fields(account_id = %account.id, requester_id = %requester.id))]
    pub async fn post_application(
        &self,
        account: &Account,
        requester: &Requester,
    ) -> Result<LinkApplication, NotifyError> {
        let skin_url = account
            .skin_texture_value
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .and_then(|descriptor| match skin_url_from_descriptor(descriptor) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(error = %e, "Could not decode appearance descriptor, omitting preview");
                    None
                }
            });

        let mut application = self
            .store
            .create_application(NewLinkApplication {
                account_id: account.id,
                requester_id: requester.id,
                requester_name: requester.display_name.clone(),
                requester_avatar_url: requester.avatar_url.clone(),
                display_name: account.username.clone(),
                history: account.rp_history.clone(),
                skin_url,
            })
            .await?;

        let staff = self.review.staff_roles();
        let (card, controls) = render_card(&application, &self.skin_viewer_url);
        let payload = MessagePayload {
            content: Some(staff_ping(staff)),
            embeds: Some(vec![card]),
            components: Some(vec![controls]),
            allowed_mentions: Some(AllowedMentions::roles(staff)),
            flags: None,
        };

        let message = match self.platform.post_card(self.review.channel_id, payload).await {
            Ok(message) => message,
            Err(e) => {
                // A later `/link` creates a fresh application.
                if let Err(discard) = self.store.discard_application(application.id).await {
                    warn!(
                        error = %discard,
                        application_id = %application.id,
                        "Uncarded application not discarded"
                    );
                }
                return Err(e.into());
            }
        };

        // Buttons carry the application ID and keep working without this.
        if let Err(e) = self
            .store
            .attach_card(application.id, message.channel_id, message.id)
            .await
        {
            error!(error = %e, message_id = %message.id, "Posted card location not recorded");
        }
        application.channel_id = Some(message.channel_id);
        application.message_id = Some(message.id);

        info!(
            application_id = %application.id,
            message_id = %message.id,
            "Review card posted"
        );
        Ok(application)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use reqwest::StatusCode;
    use waco_verify_core::ApplicationStatus;

    use super::*;
    use crate::config::DEFAULT_SKIN_VIEWER_URL;
    use crate::db::InMemoryLinkStore;
    use crate::testing::{self, Operation, REVIEW_CHANNEL, RecordingPlatform};

    const SKIN: &str = "http://textures.minecraft.net/texture/abc123";

    fn notifier(store: &Arc<InMemoryLinkStore>, platform: &Arc<RecordingPlatform>) -> ApplicationNotifier {
        ApplicationNotifier::new(
            store.clone(),
            platform.clone(),
            testing::review_config(),
            DEFAULT_SKIN_VIEWER_URL.to_string(),
        )
    }

    fn account_with_skin(descriptor: &str) -> Account {
        Account {
            skin_texture_value: Some(descriptor.to_string()),
            ..testing::account(42, "Nova", None)
        }
    }

    #[tokio::test]
    async fn test_posts_card_with_skin_preview() {
        let store = Arc::new(InMemoryLinkStore::new());
        let platform = Arc::new(RecordingPlatform::new());
        let descriptor = STANDARD.encode(format!(r#"{{"textures":{{"SKIN":{{"url":"{SKIN}"}}}}}}"#));

        let application = notifier(&store, &platform)
            .post_application(&account_with_skin(&descriptor), &testing::requester(555))
            .await
            .unwrap();

        assert_eq!(application.skin_url.as_deref(), Some(SKIN));
        assert_eq!(application.channel_id, Some(REVIEW_CHANNEL));

        let stored = store.applications().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, ApplicationStatus::Pending);
        assert_eq!(stored[0].message_id, application.message_id);

        let payload = &platform.posted_cards()[0];
        let card = &payload.embeds.as_ref().unwrap()[0];
        assert_eq!(card.thumbnail.as_ref().unwrap().url, SKIN);
        assert!(card.fields.iter().any(|f| f.name == "Skin"));
        assert_eq!(
            payload.allowed_mentions,
            Some(AllowedMentions::roles(testing::review_config().staff_roles()))
        );
    }

    #[tokio::test]
    async fn test_bad_descriptor_only_drops_preview() {
        let store = Arc::new(InMemoryLinkStore::new());
        let platform = Arc::new(RecordingPlatform::new());

        let application = notifier(&store, &platform)
            .post_application(&account_with_skin("%%% not base64"), &testing::requester(555))
            .await
            .unwrap();

        assert_eq!(application.skin_url, None);
        let binding = platform.posted_cards();
        let card = &binding[0].embeds.as_ref().unwrap()[0];
        assert!(card.thumbnail.is_none());
        assert!(card.fields.iter().all(|f| f.name != "Skin"));
    }

    #[tokio::test]
    async fn test_post_failure_discards_application() {
        let store = Arc::new(InMemoryLinkStore::new());
        let platform = Arc::new(RecordingPlatform::new());
        platform.fail(Operation::PostCard, StatusCode::FORBIDDEN);
        let notifier = notifier(&store, &platform);
        let account = testing::account(42, "Nova", None);

        for _ in 0..3 {
            let err = notifier
                .post_application(&account, &testing::requester(555))
                .await
                .unwrap_err();
            assert!(matches!(err, NotifyError::Delivery(_)));
        }

        assert!(store.applications().await.is_empty());
        assert_eq!(platform.posted_cards().len(), 3);
    }
}
