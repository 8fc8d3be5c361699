//! Credentials, session tokens and invite codes

use huddle_core::{DomainError, NewAccount, RepoResult, Snowflake};
use sqlx::PgConnection;
use tracing::instrument;

use super::error::{map_db_error, map_unique_violation};
use crate::models::CredentialsModel;

#[instrument(skip(conn))]
pub async fn find_credentials(
    conn: &mut PgConnection,
    username: &str,
) -> RepoResult<Option<(Snowflake, String)>> {
    let result = sqlx::query_as::<_, CredentialsModel>(
        r#"
        SELECT id, password_hash
        FROM users
        WHERE LOWER(username) = LOWER($1)
        "#,
    )
    .bind(username)
    .fetch_optional(conn)
    .await
    .map_err(map_db_error)?;

    Ok(result.map(|row| (Snowflake::new(row.id), row.password_hash)))
}

#[instrument(skip(conn))]
pub async fn username_exists(conn: &mut PgConnection, username: &str) -> RepoResult<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))
        "#,
    )
    .bind(username)
    .fetch_one(conn)
    .await
    .map_err(map_db_error)?;

    Ok(exists)
}

#[instrument(skip(conn, account), fields(user_id = %account.user.id))]
pub async fn create(conn: &mut PgConnection, account: &NewAccount) -> RepoResult<()> {
    let user = &account.user;
    sqlx::query(
        r#"
        INSERT INTO users (id, username, display_name, password_hash, email, status_message,
                           profile_message, profile_color, avatar_modified)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(user.id.into_inner())
    .bind(&user.username)
    .bind(&user.display_name)
    .bind(&account.password_hash)
    .bind(account.email.as_deref())
    .bind(&user.status_message)
    .bind(&user.profile_message)
    .bind(user.profile_color)
    .bind(user.avatar_modified)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_unique_violation(e, || DomainError::UsernameTaken))?;

    for role_id in &user.roles {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user.id.into_inner())
            .bind(role_id.into_inner())
            .execute(&mut *conn)
            .await
            .map_err(map_db_error)?;
    }

    Ok(())
}

#[instrument(skip(conn, token))]
pub async fn insert_token(conn: &mut PgConnection, user_id: Snowflake, token: &str) -> RepoResult<()> {
    sqlx::query("INSERT INTO tokens (token, user_id) VALUES ($1, $2)")
        .bind(token)
        .bind(user_id.into_inner())
        .execute(conn)
        .await
        .map_err(map_db_error)?;

    Ok(())
}

#[instrument(skip_all)]
pub async fn find_token_user(conn: &mut PgConnection, token: &str) -> RepoResult<Option<Snowflake>> {
    let result: Option<i64> = sqlx::query_scalar("SELECT user_id FROM tokens WHERE token = $1")
        .bind(token)
        .fetch_optional(conn)
        .await
        .map_err(map_db_error)?;

    Ok(result.map(Snowflake::new))
}

#[instrument(skip_all)]
pub async fn delete_token(conn: &mut PgConnection, token: &str) -> RepoResult<()> {
    sqlx::query("DELETE FROM tokens WHERE token = $1")
        .bind(token)
        .execute(conn)
        .await
        .map_err(map_db_error)?;

    Ok(())
}

#[instrument(skip(conn, code))]
pub async fn insert_invite(conn: &mut PgConnection, code: &str, created_by: Snowflake) -> RepoResult<()> {
    sqlx::query("INSERT INTO invite_codes (code, created_by) VALUES ($1, $2)")
        .bind(code)
        .bind(created_by.into_inner())
        .execute(conn)
        .await
        .map_err(map_db_error)?;

    Ok(())
}

#[instrument(skip_all)]
pub async fn consume_invite(conn: &mut PgConnection, code: &str) -> RepoResult<bool> {
    let result = sqlx::query("DELETE FROM invite_codes WHERE code = $1")
        .bind(code)
        .execute(conn)
        .await
        .map_err(map_db_error)?;

    Ok(result.rows_affected() > 0)
}
