//! Message row models

use huddle_core::Embed;
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct MessageModel {
    pub id: i64,
    pub kind: i16,
    pub channel_id: i64,
    pub author_id: i64,
    pub reference_id: Option<i64>,
    pub content: String,
    pub pinned: bool,
    pub created_at: i64,
    pub edited_at: Option<i64>,
    pub mentioned_users: Vec<i64>,
    pub mentioned_roles: Vec<i64>,
    pub mentioned_channels: Vec<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AttachmentModel {
    pub id: i64,
    pub message_id: i64,
    pub filename: String,
    pub kind: i16,
    pub mimetype: String,
    pub size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// The embed body is stored whole as JSONB
#[derive(Debug, Clone, FromRow)]
pub struct EmbedModel {
    pub id: i64,
    pub message_id: i64,
    pub data: Json<Embed>,
}

/// Reactions aggregated per (message, emoji)
#[derive(Debug, Clone, FromRow)]
pub struct ReactionModel {
    pub message_id: i64,
    pub emoji_id: i64,
    pub count: i64,
    pub users: Vec<i64>,
}
