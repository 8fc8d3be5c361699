//! Message rows with their attachments, embeds and reaction summaries

use huddle_core::{Embed, Message, MessageAnchor, RepoResult, Snowflake};
use sqlx::types::Json;
use sqlx::PgConnection;
use tracing::instrument;

use super::error::map_db_error;
use crate::mappers::{assemble_messages, ids_to_i64};
use crate::models::{AttachmentModel, EmbedModel, MessageModel, ReactionModel};

const SELECT_MESSAGES: &str = r#"
    SELECT id, kind, channel_id, author_id, reference_id, content, pinned, created_at,
           edited_at, mentioned_users, mentioned_roles, mentioned_channels
    FROM messages
"#;

/// Load child rows for the given message rows and build the entities.
async fn hydrate(conn: &mut PgConnection, rows: Vec<MessageModel>) -> RepoResult<Vec<Message>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

    let attachments = sqlx::query_as::<_, AttachmentModel>(
        r#"
        SELECT id, message_id, filename, kind, mimetype, size, width, height
        FROM attachments
        WHERE message_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_db_error)?;

    let embeds = sqlx::query_as::<_, EmbedModel>(
        r#"
        SELECT id, message_id, data
        FROM embeds
        WHERE message_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_db_error)?;

    let reactions = sqlx::query_as::<_, ReactionModel>(
        r#"
        SELECT message_id, emoji_id, COUNT(*) AS count,
               (array_agg(user_id ORDER BY created_at))[1:5] AS users
        FROM reactions
        WHERE message_id = ANY($1)
        GROUP BY message_id, emoji_id
        ORDER BY message_id, MIN(created_at)
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_db_error)?;

    Ok(assemble_messages(rows, attachments, embeds, reactions))
}

#[instrument(skip(conn))]
pub async fn find_by_id(conn: &mut PgConnection, id: Snowflake) -> RepoResult<Option<Message>> {
    let sql = format!("{SELECT_MESSAGES} WHERE id = $1");
    let row = sqlx::query_as::<_, MessageModel>(&sql)
        .bind(id.into_inner())
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?;

    match row {
        Some(row) => Ok(hydrate(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

#[instrument(skip(conn, ids), fields(count = ids.len()))]
pub async fn find_by_ids(conn: &mut PgConnection, ids: &[Snowflake]) -> RepoResult<Vec<Message>> {
    let sql = format!("{SELECT_MESSAGES} WHERE id = ANY($1) ORDER BY id");
    let rows = sqlx::query_as::<_, MessageModel>(&sql)
        .bind(ids_to_i64(ids))
        .fetch_all(&mut *conn)
        .await
        .map_err(map_db_error)?;

    hydrate(conn, rows).await
}

#[instrument(skip(conn))]
pub async fn find_by_anchor(
    conn: &mut PgConnection,
    channel_id: Snowflake,
    anchor: MessageAnchor,
    limit: usize,
) -> RepoResult<Vec<Message>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let query = match anchor {
        MessageAnchor::Latest => {
            let sql = format!("{SELECT_MESSAGES} WHERE channel_id = $1 ORDER BY id DESC LIMIT $2");
            sqlx::query_as::<_, MessageModel>(&sql)
                .bind(channel_id.into_inner())
                .bind(limit)
                .fetch_all(&mut *conn)
                .await
        }
        MessageAnchor::Before(before) => {
            let sql = format!(
                "{SELECT_MESSAGES} WHERE channel_id = $1 AND id < $3 ORDER BY id DESC LIMIT $2"
            );
            sqlx::query_as::<_, MessageModel>(&sql)
                .bind(channel_id.into_inner())
                .bind(limit)
                .bind(before.into_inner())
                .fetch_all(&mut *conn)
                .await
        }
        MessageAnchor::After(after) => {
            let sql = format!(
                "{SELECT_MESSAGES} WHERE channel_id = $1 AND id > $3 ORDER BY id ASC LIMIT $2"
            );
            sqlx::query_as::<_, MessageModel>(&sql)
                .bind(channel_id.into_inner())
                .bind(limit)
                .bind(after.into_inner())
                .fetch_all(&mut *conn)
                .await
        }
    };
    let mut rows = query.map_err(map_db_error)?;

    // Pages are delivered oldest first
    if !matches!(anchor, MessageAnchor::After(_)) {
        rows.reverse();
    }

    hydrate(conn, rows).await
}

#[instrument(skip(conn, message), fields(message_id = %message.id))]
pub async fn create(conn: &mut PgConnection, message: &Message) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO messages (id, kind, channel_id, author_id, reference_id, content, pinned,
                              created_at, edited_at, mentioned_users, mentioned_roles,
                              mentioned_channels)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(message.id.into_inner())
    .bind(i16::from(message.kind))
    .bind(message.channel.into_inner())
    .bind(message.author.into_inner())
    .bind(message.reference.map(Snowflake::into_inner))
    .bind(&message.content)
    .bind(message.pinned)
    .bind(message.timestamp)
    .bind(message.edited_timestamp)
    .bind(ids_to_i64(&message.mentioned_users))
    .bind(ids_to_i64(&message.mentioned_roles))
    .bind(ids_to_i64(&message.mentioned_channels))
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?;

    for attachment in &message.attachments {
        sqlx::query(
            r#"
            INSERT INTO attachments (id, message_id, filename, kind, mimetype, size, width, height)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(attachment.id.into_inner())
        .bind(message.id.into_inner())
        .bind(&attachment.filename)
        .bind(i16::from(u8::from(attachment.kind)))
        .bind(&attachment.mimetype)
        .bind(attachment.size)
        .bind(attachment.width)
        .bind(attachment.height)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    }

    Ok(())
}

#[instrument(skip(conn, message), fields(message_id = %message.id))]
pub async fn update(
    conn: &mut PgConnection,
    message: &Message,
    removed_embeds: &[Snowflake],
) -> RepoResult<()> {
    sqlx::query(
        r#"
        UPDATE messages
        SET content = $2, edited_at = $3, mentioned_users = $4, mentioned_roles = $5,
            mentioned_channels = $6
        WHERE id = $1
        "#,
    )
    .bind(message.id.into_inner())
    .bind(&message.content)
    .bind(message.edited_timestamp)
    .bind(ids_to_i64(&message.mentioned_users))
    .bind(ids_to_i64(&message.mentioned_roles))
    .bind(ids_to_i64(&message.mentioned_channels))
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?;

    if !removed_embeds.is_empty() {
        sqlx::query("DELETE FROM embeds WHERE message_id = $1 AND id = ANY($2)")
            .bind(message.id.into_inner())
            .bind(ids_to_i64(removed_embeds))
            .execute(&mut *conn)
            .await
            .map_err(map_db_error)?;
    }

    Ok(())
}

#[instrument(skip(conn))]
pub async fn delete(conn: &mut PgConnection, id: Snowflake) -> RepoResult<()> {
    sqlx::query("DELETE FROM messages WHERE id = $1")
        .bind(id.into_inner())
        .execute(conn)
        .await
        .map_err(map_db_error)?;

    Ok(())
}

#[instrument(skip(conn, embed), fields(embed_id = %embed.id))]
pub async fn add_embed(conn: &mut PgConnection, message_id: Snowflake, embed: &Embed) -> RepoResult<()> {
    sqlx::query("INSERT INTO embeds (id, message_id, url, data) VALUES ($1, $2, $3, $4)")
        .bind(embed.id.into_inner())
        .bind(message_id.into_inner())
        .bind(&embed.url)
        .bind(Json(embed))
        .execute(conn)
        .await
        .map_err(map_db_error)?;

    Ok(())
}
