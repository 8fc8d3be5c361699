//! User rows and role assignments

use huddle_core::{ProfileUpdate, RepoResult, Snowflake, User};
use sqlx::PgConnection;
use tracing::instrument;

use super::error::map_db_error;
use crate::models::UserModel;

const SELECT_USERS: &str = r#"
    SELECT u.id, u.username, u.display_name, u.status_message, u.profile_message,
           u.profile_color, u.avatar_modified,
           ARRAY(SELECT ur.role_id FROM user_roles ur WHERE ur.user_id = u.id ORDER BY ur.role_id)
               AS roles
    FROM users u
"#;

#[instrument(skip(conn))]
pub async fn find_by_id(conn: &mut PgConnection, id: Snowflake) -> RepoResult<Option<User>> {
    let sql = format!("{SELECT_USERS} WHERE u.id = $1");
    let result = sqlx::query_as::<_, UserModel>(&sql)
        .bind(id.into_inner())
        .fetch_optional(conn)
        .await
        .map_err(map_db_error)?;

    Ok(result.map(User::from))
}

#[instrument(skip(conn))]
pub async fn find_all(conn: &mut PgConnection) -> RepoResult<Vec<User>> {
    let sql = format!("{SELECT_USERS} ORDER BY u.id");
    let results = sqlx::query_as::<_, UserModel>(&sql)
        .fetch_all(conn)
        .await
        .map_err(map_db_error)?;

    Ok(results.into_iter().map(User::from).collect())
}

#[instrument(skip(conn, profile))]
pub async fn update_profile(
    conn: &mut PgConnection,
    id: Snowflake,
    profile: &ProfileUpdate,
) -> RepoResult<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET display_name = $2, status_message = $3, profile_message = $4,
            profile_color = $5, avatar_modified = $6
        WHERE id = $1
        "#,
    )
    .bind(id.into_inner())
    .bind(&profile.display_name)
    .bind(&profile.status_message)
    .bind(&profile.profile_message)
    .bind(profile.profile_color)
    .bind(profile.avatar_modified)
    .execute(conn)
    .await
    .map_err(map_db_error)?;

    Ok(())
}

#[instrument(skip(conn))]
pub async fn add_role(conn: &mut PgConnection, user_id: Snowflake, role_id: Snowflake) -> RepoResult<()> {
    sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(user_id.into_inner())
        .bind(role_id.into_inner())
        .execute(conn)
        .await
        .map_err(map_db_error)?;

    Ok(())
}

#[instrument(skip(conn))]
pub async fn remove_role(conn: &mut PgConnection, user_id: Snowflake, role_id: Snowflake) -> RepoResult<()> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
        .bind(user_id.into_inner())
        .bind(role_id.into_inner())
        .execute(conn)
        .await
        .map_err(map_db_error)?;

    Ok(())
}
