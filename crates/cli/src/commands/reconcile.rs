//! One-off card reconciliation.
//!
//! Runs the same pass the bot runs on its interval: every decided
//! application whose card was never updated is re-rendered and edited.
//! Uses the full bot configuration.

use std::sync::Arc;

use thiserror::Error;
use waco_verify_bot::config::{BotConfig, ConfigError};
use waco_verify_bot::db::{PgLinkStore, create_pool};
use waco_verify_bot::discord::DiscordClient;
use waco_verify_bot::error::AppError;
use waco_verify_bot::services::CardReconciler;

/// Errors that can occur during reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Reconciliation failed: {0}")]
    Pass(#[from] AppError),
}

/// Run one reconciliation pass.
///
/// # Errors
///
/// Returns `ReconcileError` if configuration or the database is unavailable.
pub async fn run() -> Result<(), ReconcileError> {
    let config = BotConfig::from_env()?;

    tracing::info!("Connecting to bot database...");
    let pool = create_pool(&config.database_url).await?;

    let reconciler = CardReconciler::new(
        Arc::new(PgLinkStore::new(pool)),
        Arc::new(DiscordClient::from_config(&config.discord)),
        config.skin_viewer_url,
    );

    let synced = reconciler.run_once().await?;
    tracing::info!("Reconciled {synced} card(s)");
    Ok(())
}
