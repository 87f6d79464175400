//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::BotConfig;
use crate::db::LinkStore;
use crate::discord::{ChatPlatform, InteractionVerifier, SignatureError};
use crate::services::{ApplicationNotifier, CardReconciler, DecisionService, LinkService};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: BotConfig,
    store: Arc<dyn LinkStore>,
    platform: Arc<dyn ChatPlatform>,
    verifier: InteractionVerifier,
    linker: LinkService,
    decisions: DecisionService,
    reconciler: CardReconciler,
}

impl AppState {
    /// Wire the services over a store and a chat platform.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::InvalidPublicKey` if the configured Discord
    /// public key is unusable.
    pub fn new(
        config: BotConfig,
        store: Arc<dyn LinkStore>,
        platform: Arc<dyn ChatPlatform>,
    ) -> Result<Self, SignatureError> {
        let verifier = InteractionVerifier::from_hex(&config.discord.public_key)?;

        let reconciler = CardReconciler::new(
            Arc::clone(&store),
            Arc::clone(&platform),
            config.skin_viewer_url.clone(),
        );
        let notifier = ApplicationNotifier::new(
            Arc::clone(&store),
            Arc::clone(&platform),
            config.review,
            config.skin_viewer_url.clone(),
        );
        let linker = LinkService::new(Arc::clone(&store), notifier);
        let decisions = DecisionService::new(
            Arc::clone(&store),
            Arc::clone(&platform),
            config.review,
            reconciler.clone(),
            config.discord.guild_id,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                platform,
                verifier,
                linker,
                decisions,
                reconciler,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &BotConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn LinkStore> {
        &self.inner.store
    }

    #[must_use]
    pub fn platform(&self) -> &Arc<dyn ChatPlatform> {
        &self.inner.platform
    }

    #[must_use]
    pub fn verifier(&self) -> &InteractionVerifier {
        &self.inner.verifier
    }

    #[must_use]
    pub fn linker(&self) -> &LinkService {
        &self.inner.linker
    }

    #[must_use]
    pub fn decisions(&self) -> &DecisionService {
        &self.inner.decisions
    }

    #[must_use]
    pub fn reconciler(&self) -> &CardReconciler {
        &self.inner.reconciler
    }
}
