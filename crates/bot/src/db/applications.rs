//! Database operations for link applications (review cards).

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use waco_verify_core::{
    AccountId, ApplicationStatus, ChannelId, LinkApplicationId, MessageId, UserId,
};

use super::RepositoryError;
use crate::models::{Actor, LinkApplication, NewLinkApplication};

macro_rules! application_columns {
    () => {
        "id, account_id, requester_id, requester_name, requester_avatar_url, \
         display_name, history, skin_url, status, channel_id, message_id, \
         decided_by_id, decided_by_name, decided_at, role_changes, card_synced, created_at"
    };
}

#[derive(Debug, sqlx::FromRow)]
struct ApplicationRow {
    id: LinkApplicationId,
    account_id: AccountId,
    requester_id: String,
    requester_name: String,
    requester_avatar_url: Option<String>,
    display_name: String,
    history: Option<String>,
    skin_url: Option<String>,
    status: ApplicationStatus,
    channel_id: Option<String>,
    message_id: Option<String>,
    decided_by_id: Option<String>,
    decided_by_name: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    role_changes: Vec<String>,
    card_synced: bool,
    created_at: DateTime<Utc>,
}

fn parse_snowflake<T>(column: &str, raw: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
{
    raw.parse::<T>().map_err(|_| {
        RepositoryError::DataCorruption(format!("invalid snowflake in {column}: {raw:?}"))
    })
}

fn parse_optional_snowflake<T>(column: &str, raw: Option<&str>) -> Result<Option<T>, RepositoryError>
where
    T: std::str::FromStr,
{
    raw.map(|value| parse_snowflake(column, value)).transpose()
}

impl TryFrom<ApplicationRow> for LinkApplication {
    type Error = RepositoryError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            account_id: row.account_id,
            requester_id: parse_snowflake::<UserId>("requester_id", &row.requester_id)?,
            requester_name: row.requester_name,
            requester_avatar_url: row.requester_avatar_url,
            display_name: row.display_name,
            history: row.history,
            skin_url: row.skin_url,
            status: row.status,
            channel_id: parse_optional_snowflake::<ChannelId>(
                "channel_id",
                row.channel_id.as_deref(),
            )?,
            message_id: parse_optional_snowflake::<MessageId>(
                "message_id",
                row.message_id.as_deref(),
            )?,
            decided_by_id: parse_optional_snowflake::<UserId>(
                "decided_by_id",
                row.decided_by_id.as_deref(),
            )?,
            decided_by_name: row.decided_by_name,
            decided_at: row.decided_at,
            role_changes: row.role_changes,
            card_synced: row.card_synced,
            created_at: row.created_at,
        })
    }
}

/// Create a new pending application.
///
/// # Errors
///
/// Returns error if the database insert fails.
pub async fn insert_application<'e, E: PgExecutor<'e>>(
    executor: E,
    id: LinkApplicationId,
    params: &NewLinkApplication,
) -> Result<LinkApplication, RepositoryError> {
    let row = sqlx::query_as::<_, ApplicationRow>(concat!(
        "INSERT INTO link_applications (
            id, account_id, requester_id, requester_name, requester_avatar_url,
            display_name, history, skin_url
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING ",
        application_columns!()
    ))
    .bind(id)
    .bind(params.account_id)
    .bind(params.requester_id.to_string())
    .bind(&params.requester_name)
    .bind(params.requester_avatar_url.as_deref())
    .bind(&params.display_name)
    .bind(params.history.as_deref())
    .bind(params.skin_url.as_deref())
    .fetch_one(executor)
    .await?;

    row.try_into()
}

/// Get an application by ID.
///
/// # Errors
///
/// Returns error if the database query fails or the row is corrupt.
pub async fn get_application<'e, E: PgExecutor<'e>>(
    executor: E,
    id: LinkApplicationId,
) -> Result<Option<LinkApplication>, RepositoryError> {
    let row = sqlx::query_as::<_, ApplicationRow>(concat!(
        "SELECT ",
        application_columns!(),
        " FROM link_applications WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.map(LinkApplication::try_from).transpose()
}

/// Latest pending application with a posted card for an account/requester pair.
///
/// # Errors
///
/// Returns error if the database query fails or the row is corrupt.
pub async fn find_open_application<'e, E: PgExecutor<'e>>(
    executor: E,
    account_id: AccountId,
    requester_id: UserId,
) -> Result<Option<LinkApplication>, RepositoryError> {
    let row = sqlx::query_as::<_, ApplicationRow>(concat!(
        "SELECT ",
        application_columns!(),
        " FROM link_applications
        WHERE account_id = $1
          AND requester_id = $2
          AND status = 'pending'
          AND message_id IS NOT NULL
        ORDER BY created_at DESC
        LIMIT 1"
    ))
    .bind(account_id)
    .bind(requester_id.to_string())
    .fetch_optional(executor)
    .await?;

    row.map(LinkApplication::try_from).transpose()
}

/// Record the posted card's channel and message.
///
/// # Errors
///
/// Returns error if the database update fails.
pub async fn update_card_info<'e, E: PgExecutor<'e>>(
    executor: E,
    id: LinkApplicationId,
    channel_id: ChannelId,
    message_id: MessageId,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE link_applications
        SET channel_id = $2, message_id = $3
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(channel_id.to_string())
    .bind(message_id.to_string())
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    Ok(())
}

/// Delete a pending application that has no card.
///
/// # Errors
///
/// Returns error if the database delete fails.
pub async fn delete_uncarded<'e, E: PgExecutor<'e>>(
    executor: E,
    id: LinkApplicationId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        DELETE FROM link_applications
        WHERE id = $1 AND status = 'pending' AND message_id IS NULL
        ",
    )
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Move a pending application to `outcome`.
///
/// Returns `None` when the application is missing or no longer pending; the
/// `status = 'pending'` predicate makes concurrent claims mutually exclusive.
///
/// # Errors
///
/// Returns error if the database update fails.
pub async fn claim_application<'e, E: PgExecutor<'e>>(
    executor: E,
    id: LinkApplicationId,
    outcome: ApplicationStatus,
    actor: &Actor,
) -> Result<Option<LinkApplication>, RepositoryError> {
    let row = sqlx::query_as::<_, ApplicationRow>(concat!(
        "UPDATE link_applications
        SET status = $2, decided_by_id = $3, decided_by_name = $4, decided_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING ",
        application_columns!()
    ))
    .bind(id)
    .bind(outcome)
    .bind(actor.id.to_string())
    .bind(&actor.name)
    .fetch_optional(executor)
    .await?;

    row.map(LinkApplication::try_from).transpose()
}

/// Get only the status of an application.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn get_status<'e, E: PgExecutor<'e>>(
    executor: E,
    id: LinkApplicationId,
) -> Result<Option<ApplicationStatus>, RepositoryError> {
    let status = sqlx::query_scalar::<_, ApplicationStatus>(
        r"
        SELECT status FROM link_applications WHERE id = $1
        ",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(status)
}

/// Store the role reconciliation lines for the decision field.
///
/// # Errors
///
/// Returns error if the database update fails.
pub async fn update_role_changes<'e, E: PgExecutor<'e>>(
    executor: E,
    id: LinkApplicationId,
    changes: &[String],
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE link_applications
        SET role_changes = $2
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(changes)
    .execute(executor)
    .await?;

    Ok(())
}

/// Mark the card as synced with the persisted decision.
///
/// # Errors
///
/// Returns error if the database update fails.
pub async fn mark_card_synced<'e, E: PgExecutor<'e>>(
    executor: E,
    id: LinkApplicationId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE link_applications
        SET card_synced = TRUE
        WHERE id = $1
        ",
    )
    .bind(id)
    .execute(executor)
    .await?;

    Ok(())
}

/// Decided applications whose posted card has not been updated yet.
///
/// # Errors
///
/// Returns error if the database query fails or a row is corrupt.
pub async fn get_unsynced_decisions<'e, E: PgExecutor<'e>>(
    executor: E,
    limit: i64,
) -> Result<Vec<LinkApplication>, RepositoryError> {
    let rows = sqlx::query_as::<_, ApplicationRow>(concat!(
        "SELECT ",
        application_columns!(),
        " FROM link_applications
        WHERE status <> 'pending'
          AND card_synced = FALSE
          AND message_id IS NOT NULL
        ORDER BY decided_at ASC
        LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(LinkApplication::try_from).collect()
}
