//! Channel rows and their permission overwrites

use huddle_core::{Channel, RepoResult, Snowflake};
use sqlx::PgConnection;
use tracing::instrument;

use super::error::map_db_error;
use crate::mappers::assemble_channels;
use crate::models::{ChannelModel, OverwriteModel};

async fn find_overwrites(conn: &mut PgConnection, ids: &[i64]) -> RepoResult<Vec<OverwriteModel>> {
    sqlx::query_as::<_, OverwriteModel>(
        r#"
        SELECT channel_id, target_id, kind, allow_bits, deny_bits
        FROM channel_overwrites
        WHERE channel_id = ANY($1)
        ORDER BY channel_id, kind, target_id
        "#,
    )
    .bind(ids)
    .fetch_all(conn)
    .await
    .map_err(map_db_error)
}

async fn insert_overwrites(conn: &mut PgConnection, channel: &Channel) -> RepoResult<()> {
    for overwrite in &channel.overwrites {
        sqlx::query(
            r#"
            INSERT INTO channel_overwrites (channel_id, target_id, kind, allow_bits, deny_bits)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (channel_id, kind, target_id)
            DO UPDATE SET allow_bits = EXCLUDED.allow_bits, deny_bits = EXCLUDED.deny_bits
            "#,
        )
        .bind(channel.id.into_inner())
        .bind(overwrite.id.into_inner())
        .bind(i16::from(u8::from(overwrite.kind)))
        .bind(overwrite.allow.to_i64())
        .bind(overwrite.deny.to_i64())
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    }
    Ok(())
}

#[instrument(skip(conn))]
pub async fn find_by_id(conn: &mut PgConnection, id: Snowflake) -> RepoResult<Option<Channel>> {
    let row = sqlx::query_as::<_, ChannelModel>(
        r#"
        SELECT id, kind, name, description, position, parent_id
        FROM channels
        WHERE id = $1
        "#,
    )
    .bind(id.into_inner())
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?;

    let Some(row) = row else {
        return Ok(None);
    };
    let overwrites = find_overwrites(conn, &[row.id]).await?;
    Ok(assemble_channels(vec![row], overwrites).pop())
}

#[instrument(skip(conn))]
pub async fn find_all(conn: &mut PgConnection) -> RepoResult<Vec<Channel>> {
    let rows = sqlx::query_as::<_, ChannelModel>(
        r#"
        SELECT id, kind, name, description, position, parent_id
        FROM channels
        ORDER BY position, id
        "#,
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(map_db_error)?;

    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let overwrites = find_overwrites(conn, &ids).await?;
    Ok(assemble_channels(rows, overwrites))
}

#[instrument(skip(conn, channel), fields(channel_id = %channel.id))]
pub async fn create(conn: &mut PgConnection, channel: &Channel) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO channels (id, kind, name, description, position, parent_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(channel.id.into_inner())
    .bind(i16::from(u8::from(channel.kind)))
    .bind(&channel.name)
    .bind(&channel.description)
    .bind(channel.position)
    .bind(channel.parent.map(Snowflake::into_inner))
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?;

    insert_overwrites(conn, channel).await
}

#[instrument(skip(conn, channel), fields(channel_id = %channel.id))]
pub async fn update(conn: &mut PgConnection, channel: &Channel) -> RepoResult<()> {
    sqlx::query(
        r#"
        UPDATE channels
        SET kind = $2, name = $3, description = $4, position = $5, parent_id = $6
        WHERE id = $1
        "#,
    )
    .bind(channel.id.into_inner())
    .bind(i16::from(u8::from(channel.kind)))
    .bind(&channel.name)
    .bind(&channel.description)
    .bind(channel.position)
    .bind(channel.parent.map(Snowflake::into_inner))
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?;

    sqlx::query("DELETE FROM channel_overwrites WHERE channel_id = $1")
        .bind(channel.id.into_inner())
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;

    insert_overwrites(conn, channel).await
}

/// Messages and overwrites go with the row through the cascade
#[instrument(skip(conn))]
pub async fn delete(conn: &mut PgConnection, id: Snowflake) -> RepoResult<()> {
    sqlx::query("DELETE FROM channels WHERE id = $1")
        .bind(id.into_inner())
        .execute(conn)
        .await
        .map_err(map_db_error)?;

    Ok(())
}
