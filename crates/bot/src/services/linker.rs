//! Account linking (`/link`).

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};
use waco_verify_core::AccountId;

use super::notifier::{ApplicationNotifier, NotifyError};
use crate::db::{BindOutcome, LinkStore, RepositoryError};
use crate::discord::messages;
use crate::models::{Account, LinkApplication, Requester};

/// Errors that can occur while linking an account.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("account {0} is linked to another Discord user")]
    AlreadyLinked(AccountId),

    #[error("persistence failure: {0}")]
    Persistence(#[from] RepositoryError),

    /// The link is stored but the review card could not be posted.
    #[error("review card not delivered: {0}")]
    CardDelivery(#[source] NotifyError),
}

impl LinkError {
    /// Private reply for the requester. Never includes internal detail.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::AccountNotFound(_) => messages::LINK_ACCOUNT_NOT_FOUND,
            Self::AlreadyLinked(_) => messages::LINK_ALREADY_LINKED,
            Self::Persistence(_) => messages::LINK_FAILED,
            Self::CardDelivery(_) => messages::LINK_CARD_DELIVERY_FAILED,
        }
    }

    /// Whether this is an expected outcome rather than a fault.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(self, Self::AccountNotFound(_) | Self::AlreadyLinked(_))
    }
}

/// What happened to the review card for a successful link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardState {
    /// A new card was posted.
    Posted(LinkApplication),
    /// A card for the same account and requester is still awaiting review.
    AlreadyPending(LinkApplication),
}

/// Result of a successful link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReceipt {
    pub account: Account,
    /// False when the account was already linked to the requester.
    pub newly_bound: bool,
    pub card: CardState,
}

impl LinkReceipt {
    /// Private reply for the requester.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.card {
            CardState::Posted(_) => messages::link_success(&self.account.username),
            CardState::AlreadyPending(_) => messages::link_already_pending(&self.account.username),
        }
    }
}

/// Binds Discord identities to game accounts and requests review.
#[derive(Clone)]
pub struct LinkService {
    store: Arc<dyn LinkStore>,
    notifier: ApplicationNotifier,
}

impl LinkService {
    #[must_use]
    pub fn new(store: Arc<dyn LinkStore>, notifier: ApplicationNotifier) -> Self {
        Self { store, notifier }
    }

    /// Link `account_id` to the requester and post a review card.
    ///
    /// Re-linking by the same requester succeeds without rebinding. If their
    /// earlier card is still pending no new card is posted.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::AccountNotFound` or `LinkError::AlreadyLinked`
    /// without mutating anything, `LinkError::Persistence` on storage
    /// failure, and `LinkError::CardDelivery` when the link is stored but the
    /// card could not be posted.
    #[instrument(skip(self, requester), fields(requester_id = %requester.id, account_id = %account_id))]
    pub async fn link(
        &self,
        requester: &Requester,
        account_id: AccountId,
    ) -> Result<LinkReceipt, LinkError> {
        let (account, newly_bound) = match self.store.bind_account(account_id, requester.id).await? {
            BindOutcome::Bound {
                account,
                newly_bound,
            } => (account, newly_bound),
            BindOutcome::AlreadyLinked => {
                info!("Link refused, account bound to another identity");
                return Err(LinkError::AlreadyLinked(account_id));
            }
            BindOutcome::NotFound => return Err(LinkError::AccountNotFound(account_id)),
        };

        if newly_bound {
            info!("Discord identity bound to account");
        }

        if let Some(open) = self
            .store
            .find_open_application(account_id, requester.id)
            .await?
        {
            info!(application_id = %open.id, "Application already awaiting review");
            return Ok(LinkReceipt {
                account,
                newly_bound,
                card: CardState::AlreadyPending(open),
            });
        }

        let application = self
            .notifier
            .post_application(&account, requester)
            .await
            .map_err(|e| match e {
                NotifyError::Persistence(e) => LinkError::Persistence(e),
                delivery @ NotifyError::Delivery(_) => {
                    warn!(error = %delivery, "Account linked but review card not posted");
                    LinkError::CardDelivery(delivery)
                }
            })?;

        Ok(LinkReceipt {
            account,
            newly_bound,
            card: CardState::Posted(application),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::StatusCode;
    use waco_verify_core::ApplicationStatus;

    use super::*;
    use crate::config::DEFAULT_SKIN_VIEWER_URL;
    use crate::db::InMemoryLinkStore;
    use crate::testing::{self, Operation, RecordingPlatform};

    fn service(store: &Arc<InMemoryLinkStore>, platform: &Arc<RecordingPlatform>) -> LinkService {
        let notifier = ApplicationNotifier::new(
            store.clone(),
            platform.clone(),
            testing::review_config(),
            DEFAULT_SKIN_VIEWER_URL.to_string(),
        );
        LinkService::new(store.clone(), notifier)
    }

    async fn setup() -> (Arc<InMemoryLinkStore>, Arc<RecordingPlatform>, LinkService) {
        let store = Arc::new(InMemoryLinkStore::new());
        store
            .insert_account(testing::account(42, "Nova", Some("Ran a bakery in Waco")))
            .await;
        let platform = Arc::new(RecordingPlatform::new());
        let linker = service(&store, &platform);
        (store, platform, linker)
    }

    #[tokio::test]
    async fn test_link_binds_and_posts_card() {
        let (store, platform, linker) = setup().await;

        let receipt = linker
            .link(&testing::requester(555), AccountId::new(42))
            .await
            .unwrap();

        assert!(receipt.newly_bound);
        let CardState::Posted(application) = &receipt.card else {
            panic!("expected a posted card");
        };
        assert_eq!(application.status, ApplicationStatus::Pending);
        assert!(application.card_location().is_some());
        assert_eq!(
            store.account(AccountId::new(42)).await.unwrap().discord_id.as_deref(),
            Some("555")
        );

        let cards = platform.posted_cards();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].content.as_deref(), Some("<@&10> <@&20>"));
        assert_eq!(receipt.user_message(), messages::link_success("Nova"));
    }

    #[tokio::test]
    async fn test_link_refuses_account_bound_elsewhere() {
        let (store, platform, linker) = setup().await;
        linker
            .link(&testing::requester(555), AccountId::new(42))
            .await
            .unwrap();

        let err = linker
            .link(&testing::requester(777), AccountId::new(42))
            .await
            .unwrap_err();

        assert!(matches!(err, LinkError::AlreadyLinked(_)));
        assert!(err.is_user_error());
        assert_eq!(err.user_message(), messages::LINK_ALREADY_LINKED);
        assert_eq!(
            store.account(AccountId::new(42)).await.unwrap().discord_id.as_deref(),
            Some("555")
        );
        assert_eq!(platform.posted_cards().len(), 1);
    }

    #[tokio::test]
    async fn test_link_unknown_account() {
        let (_store, platform, linker) = setup().await;

        let err = linker
            .link(&testing::requester(555), AccountId::new(9_999))
            .await
            .unwrap_err();

        assert!(matches!(err, LinkError::AccountNotFound(_)));
        assert_eq!(err.user_message(), messages::LINK_ACCOUNT_NOT_FOUND);
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_relink_with_pending_card_posts_nothing() {
        let (_store, platform, linker) = setup().await;
        let requester = testing::requester(555);
        linker.link(&requester, AccountId::new(42)).await.unwrap();

        let receipt = linker.link(&requester, AccountId::new(42)).await.unwrap();

        assert!(!receipt.newly_bound);
        assert!(matches!(receipt.card, CardState::AlreadyPending(_)));
        assert_eq!(receipt.user_message(), messages::link_already_pending("Nova"));
        assert_eq!(platform.posted_cards().len(), 1);
    }

    #[tokio::test]
    async fn test_card_failure_keeps_link_and_retries_on_next_link() {
        let (store, platform, linker) = setup().await;
        let requester = testing::requester(555);
        platform.fail(Operation::PostCard, StatusCode::FORBIDDEN);

        let err = linker.link(&requester, AccountId::new(42)).await.unwrap_err();
        assert!(matches!(err, LinkError::CardDelivery(_)));
        assert!(!err.is_user_error());
        assert_eq!(
            store.account(AccountId::new(42)).await.unwrap().discord_id.as_deref(),
            Some("555")
        );

        platform.clear_failures();
        let receipt = linker.link(&requester, AccountId::new(42)).await.unwrap();
        assert!(!receipt.newly_bound);
        assert!(matches!(receipt.card, CardState::Posted(_)));
    }

    #[tokio::test]
    async fn test_store_outage_is_persistence_error() {
        let (store, platform, linker) = setup().await;
        store.set_unavailable(true);

        let err = linker
            .link(&testing::requester(555), AccountId::new(42))
            .await
            .unwrap_err();

        assert!(matches!(err, LinkError::Persistence(_)));
        assert_eq!(err.user_message(), messages::LINK_FAILED);
        assert!(platform.calls().is_empty());
    }
}
