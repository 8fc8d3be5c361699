//! Role rows

use huddle_core::{OverwriteKind, RepoResult, Role, Snowflake};
use sqlx::PgConnection;
use tracing::instrument;

use super::error::map_db_error;
use crate::models::RoleModel;

#[instrument(skip(conn))]
pub async fn find_by_id(conn: &mut PgConnection, id: Snowflake) -> RepoResult<Option<Role>> {
    let result = sqlx::query_as::<_, RoleModel>(
        r#"
        SELECT id, name, color, position, permissions, hoisted, mentionable
        FROM roles
        WHERE id = $1
        "#,
    )
    .bind(id.into_inner())
    .fetch_optional(conn)
    .await
    .map_err(map_db_error)?;

    Ok(result.map(Role::from))
}

#[instrument(skip(conn))]
pub async fn find_all(conn: &mut PgConnection) -> RepoResult<Vec<Role>> {
    let results = sqlx::query_as::<_, RoleModel>(
        r#"
        SELECT id, name, color, position, permissions, hoisted, mentionable
        FROM roles
        ORDER BY position, id
        "#,
    )
    .fetch_all(conn)
    .await
    .map_err(map_db_error)?;

    Ok(results.into_iter().map(Role::from).collect())
}

#[instrument(skip(conn, role), fields(role_id = %role.id))]
pub async fn create(conn: &mut PgConnection, role: &Role) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO roles (id, name, color, position, permissions, hoisted, mentionable)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(role.id.into_inner())
    .bind(&role.name)
    .bind(role.color)
    .bind(role.position)
    .bind(role.permissions.to_i64())
    .bind(role.hoisted)
    .bind(role.mentionable)
    .execute(conn)
    .await
    .map_err(map_db_error)?;

    Ok(())
}

#[instrument(skip(conn, role), fields(role_id = %role.id))]
pub async fn update(conn: &mut PgConnection, role: &Role) -> RepoResult<()> {
    sqlx::query(
        r#"
        UPDATE roles
        SET name = $2, color = $3, position = $4, permissions = $5, hoisted = $6,
            mentionable = $7
        WHERE id = $1
        "#,
    )
    .bind(role.id.into_inner())
    .bind(&role.name)
    .bind(role.color)
    .bind(role.position)
    .bind(role.permissions.to_i64())
    .bind(role.hoisted)
    .bind(role.mentionable)
    .execute(conn)
    .await
    .map_err(map_db_error)?;

    Ok(())
}

/// Assignments go with the row through the cascade; channel overwrites
/// naming the role are removed explicitly.
#[instrument(skip(conn))]
pub async fn delete(conn: &mut PgConnection, id: Snowflake) -> RepoResult<()> {
    sqlx::query("DELETE FROM channel_overwrites WHERE kind = $1 AND target_id = $2")
        .bind(i16::from(u8::from(OverwriteKind::Role)))
        .bind(id.into_inner())
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;

    sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(id.into_inner())
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;

    Ok(())
}
