//! Message entity <-> model mapper

use std::collections::HashMap;

use huddle_core::{Attachment, Message, Reaction, Snowflake};

use super::variant_from_i16;
use crate::models::{AttachmentModel, EmbedModel, MessageModel, ReactionModel};

pub fn ids_to_i64(ids: &[Snowflake]) -> Vec<i64> {
    ids.iter().map(|id| id.into_inner()).collect()
}

pub fn ids_from_i64(ids: Vec<i64>) -> Vec<Snowflake> {
    ids.into_iter().map(Snowflake::new).collect()
}

impl From<MessageModel> for Message {
    fn from(model: MessageModel) -> Self {
        Message {
            id: Snowflake::new(model.id),
            kind: u8::try_from(model.kind).unwrap_or(Message::KIND_DEFAULT),
            channel: Snowflake::new(model.channel_id),
            timestamp: model.created_at,
            pinned: model.pinned,
            author: Snowflake::new(model.author_id),
            reference: model.reference_id.map(Snowflake::new),
            content: model.content,
            edited_timestamp: model.edited_at,
            attachments: Vec::new(),
            embeds: Vec::new(),
            reactions: Vec::new(),
            mentioned_users: ids_from_i64(model.mentioned_users),
            mentioned_roles: ids_from_i64(model.mentioned_roles),
            mentioned_channels: ids_from_i64(model.mentioned_channels),
            embeddable_urls: Vec::new(),
        }
    }
}

impl From<AttachmentModel> for Attachment {
    fn from(model: AttachmentModel) -> Self {
        Attachment {
            id: Snowflake::new(model.id),
            filename: model.filename,
            kind: variant_from_i16(model.kind),
            mimetype: model.mimetype,
            size: model.size,
            width: model.width,
            height: model.height,
        }
    }
}

impl From<ReactionModel> for Reaction {
    fn from(model: ReactionModel) -> Self {
        let mut users = ids_from_i64(model.users);
        users.truncate(Reaction::PREVIEW_USERS);
        Reaction {
            emoji: Snowflake::new(model.emoji_id),
            count: model.count,
            users,
        }
    }
}

/// Join child rows onto their messages. Child rows are expected in display
/// order; the message order is kept as given.
pub fn assemble_messages(
    messages: Vec<MessageModel>,
    attachments: Vec<AttachmentModel>,
    embeds: Vec<EmbedModel>,
    reactions: Vec<ReactionModel>,
) -> Vec<Message> {
    let mut messages: Vec<Message> = messages.into_iter().map(Message::from).collect();
    let index: HashMap<i64, usize> = messages
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id.into_inner(), i))
        .collect();

    for row in attachments {
        if let Some(&i) = index.get(&row.message_id) {
            messages[i].attachments.push(row.into());
        }
    }
    for row in embeds {
        if let Some(&i) = index.get(&row.message_id) {
            let mut embed = row.data.0;
            embed.id = Snowflake::new(row.id);
            messages[i].embeds.push(embed);
        }
    }
    for row in reactions {
        if let Some(&i) = index.get(&row.message_id) {
            messages[i].reactions.push(row.into());
        }
    }

    messages
}
