//! Per-user emoji reactions

use huddle_core::{RepoResult, Snowflake};
use sqlx::PgConnection;
use tracing::instrument;

use super::error::map_db_error;
use crate::mappers::ids_from_i64;

#[instrument(skip(conn))]
pub async fn create(
    conn: &mut PgConnection,
    message_id: Snowflake,
    user_id: Snowflake,
    emoji_id: Snowflake,
) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO reactions (message_id, user_id, emoji_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (message_id, emoji_id, user_id) DO NOTHING
        "#,
    )
    .bind(message_id.into_inner())
    .bind(user_id.into_inner())
    .bind(emoji_id.into_inner())
    .execute(conn)
    .await
    .map_err(map_db_error)?;

    Ok(())
}

#[instrument(skip(conn))]
pub async fn delete(
    conn: &mut PgConnection,
    message_id: Snowflake,
    user_id: Snowflake,
    emoji_id: Snowflake,
) -> RepoResult<()> {
    sqlx::query("DELETE FROM reactions WHERE message_id = $1 AND user_id = $2 AND emoji_id = $3")
        .bind(message_id.into_inner())
        .bind(user_id.into_inner())
        .bind(emoji_id.into_inner())
        .execute(conn)
        .await
        .map_err(map_db_error)?;

    Ok(())
}

#[instrument(skip(conn))]
pub async fn count(conn: &mut PgConnection, message_id: Snowflake, emoji_id: Snowflake) -> RepoResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM reactions WHERE message_id = $1 AND emoji_id = $2")
        .bind(message_id.into_inner())
        .bind(emoji_id.into_inner())
        .fetch_one(conn)
        .await
        .map_err(map_db_error)
}

#[instrument(skip(conn))]
pub async fn find_users(
    conn: &mut PgConnection,
    message_id: Snowflake,
    emoji_id: Snowflake,
) -> RepoResult<Vec<Snowflake>> {
    let ids: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT user_id
        FROM reactions
        WHERE message_id = $1 AND emoji_id = $2
        ORDER BY created_at, user_id
        "#,
    )
    .bind(message_id.into_inner())
    .bind(emoji_id.into_inner())
    .fetch_all(conn)
    .await
    .map_err(map_db_error)?;

    Ok(ids_from_i64(ids))
}
