//! Queries against the launcher-owned `users` table.
//!
//! The column set is fixed here rather than reflected at startup; a schema
//! change on the launcher side surfaces as a query error, not a silent
//! mismatch.

use sqlx::PgExecutor;
use waco_verify_core::{AccountId, UserId};

use super::RepositoryError;
use crate::models::Account;

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: AccountId,
    username: String,
    discord_id: Option<String>,
    accepted: Option<bool>,
    rp_history: Option<String>,
    skin_texture_value: Option<String>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            discord_id: row.discord_id,
            accepted: row.accepted.unwrap_or(false),
            rp_history: row.rp_history,
            skin_texture_value: row.skin_texture_value,
        }
    }
}

/// Get an account and lock its row until the transaction ends.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn get_account_for_update<'e, E: PgExecutor<'e>>(
    executor: E,
    id: AccountId,
) -> Result<Option<Account>, RepositoryError> {
    let row = sqlx::query_as::<_, AccountRow>(
        r"
        SELECT id, username, discord_id, accepted, rp_history, skin_texture_value
        FROM users
        WHERE id = $1
        FOR UPDATE
        ",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Account::from))
}

/// Set the bound Discord identity.
///
/// # Errors
///
/// Returns error if the database update fails.
pub async fn set_discord_id<'e, E: PgExecutor<'e>>(
    executor: E,
    id: AccountId,
    user: UserId,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE users
        SET discord_id = $2
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(user.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Set the acceptance flag. Zero affected rows means the account is gone.
///
/// # Errors
///
/// Returns error if the database update fails.
pub async fn set_accepted<'e, E: PgExecutor<'e>>(
    executor: E,
    id: AccountId,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE users
        SET accepted = TRUE
        WHERE id = $1
        ",
    )
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Delete an account. Zero affected rows means it was already gone.
///
/// # Errors
///
/// Returns error if the database delete fails.
pub async fn delete_account<'e, E: PgExecutor<'e>>(
    executor: E,
    id: AccountId,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        DELETE FROM users
        WHERE id = $1
        ",
    )
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}
