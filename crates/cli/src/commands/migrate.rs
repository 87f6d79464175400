//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! wv-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `BOT_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Bot migrations: `crates/bot/migrations/`. They only create the bot's own
//! `link_applications` table; the launcher owns `users`.

use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run bot database migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or a migration
/// fails.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("BOT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| MigrationError::MissingEnvVar("DATABASE_URL"))?;

    tracing::info!("Connecting to bot database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Running bot migrations...");
    sqlx::migrate!("../bot/migrations").run(&pool).await?;

    tracing::info!("Bot migrations complete!");
    Ok(())
}
