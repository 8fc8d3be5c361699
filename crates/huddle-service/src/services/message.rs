//! Message service
//!
//! Handles history paging, sending (including the deferred attachment
//! path), editing, deletion and link-preview backfill.

use std::collections::BTreeSet;

use huddle_core::{
    now_millis, DomainError, Message, MessageAnchor, NewAttachment, Permissions, Snowflake,
};
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::content::parse_content;
use crate::dto::{
    MessageAddEvent, MessageDeleteRequest, MessageSendRequest, MessageUpdateRequest,
    MessagesRequest, MessagesResponse,
};

use super::context::ServiceContext;
use super::error::{require, ServiceError, ServiceResult};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 100;

/// One file received for a pending message
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Result of an edit: the stored message and the links still to preview
#[derive(Debug, Clone)]
pub struct MessageEdit {
    pub message: Message,
    /// Empty when the author lacks `EMBED_LINKS`
    pub fetch_urls: Vec<String>,
}

/// Clamp a client-supplied page size; zero or negative means the default.
pub fn history_limit(requested: i64) -> usize {
    if requested <= 0 {
        DEFAULT_HISTORY_LIMIT
    } else {
        usize::try_from(requested).map_or(MAX_HISTORY_LIMIT, |n| n.clamp(1, MAX_HISTORY_LIMIT))
    }
}

/// Message service
pub struct MessageService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> MessageService<'a> {
    /// Create a new MessageService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    fn require_channel(&self, channel_id: Snowflake) -> ServiceResult<()> {
        if self.ctx.index().channel(channel_id).is_none() {
            return Err(DomainError::ChannelNotFound(channel_id).into());
        }
        Ok(())
    }

    /// One page of channel history, oldest first, plus the messages the page
    /// replies to.
    #[instrument(skip(self, request), fields(channel_id = %request.channel))]
    pub async fn history(
        &self,
        actor: Snowflake,
        request: MessagesRequest,
    ) -> ServiceResult<MessagesResponse> {
        self.require_channel(request.channel)?;
        let perms = self.ctx.index().channel_permissions(actor, request.channel);
        require(
            perms,
            Permissions::VIEW_CHANNEL | Permissions::READ_MESSAGE_HISTORY,
        )?;

        let limit = history_limit(request.limit);
        let before = request.before.non_zero();
        let after = request.after.non_zero();
        let channel = request.channel;

        let mut tx = self.ctx.storage().begin().await?;
        let messages = match (before, after) {
            (Some(before), Some(after)) => {
                if before != after {
                    return Err(ServiceError::invalid_request(
                        "before and after must name the same message",
                    ));
                }
                let mut page = tx
                    .messages_by_anchor(channel, MessageAnchor::Before(before), limit)
                    .await?;
                if let Some(anchor) = tx.message(before).await? {
                    if anchor.channel == channel {
                        page.push(anchor);
                    }
                }
                page.extend(
                    tx.messages_by_anchor(channel, MessageAnchor::After(after), limit)
                        .await?,
                );
                page
            }
            (Some(before), None) => {
                tx.messages_by_anchor(channel, MessageAnchor::Before(before), limit)
                    .await?
            }
            (None, Some(after)) => {
                tx.messages_by_anchor(channel, MessageAnchor::After(after), limit)
                    .await?
            }
            (None, None) => {
                tx.messages_by_anchor(channel, MessageAnchor::Latest, limit)
                    .await?
            }
        };

        let reference_ids: Vec<Snowflake> = messages
            .iter()
            .filter_map(|m| m.reference)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let references = if reference_ids.is_empty() {
            Vec::new()
        } else {
            tx.messages_by_ids(&reference_ids).await?
        };
        tx.commit().await?;

        Ok(MessagesResponse {
            channel,
            before: request.before,
            after: request.after,
            limit,
            messages,
            references,
        })
    }

    /// Check permissions and build the message a send request describes.
    ///
    /// Nothing is written; the caller either finalizes it directly or parks
    /// it behind an upload slot when attachments were announced.
    #[instrument(skip(self, request), fields(channel_id = %request.channel))]
    pub fn prepare(&self, actor: Snowflake, request: MessageSendRequest) -> ServiceResult<Message> {
        request.validate()?;
        self.require_channel(request.channel)?;

        let perms = self.ctx.index().channel_permissions(actor, request.channel);
        require(perms, Permissions::SEND_MESSAGES)?;
        if request.attachment_count > 0 {
            require(perms, Permissions::UPLOAD_FILES)?;
        } else if request.content.trim().is_empty() {
            return Err(ServiceError::invalid_request("message is empty"));
        }

        let parsed = parse_content(&request.content);
        let embeddable_urls = if perms.has(Permissions::EMBED_LINKS) {
            parsed.urls
        } else {
            Vec::new()
        };

        Ok(Message {
            id: self.ctx.generate_id(),
            kind: Message::KIND_DEFAULT,
            channel: request.channel,
            timestamp: now_millis(),
            author: actor,
            reference: request.reference.non_zero(),
            content: request.content,
            mentioned_users: parsed.users,
            mentioned_roles: parsed.roles,
            mentioned_channels: parsed.channels,
            embeddable_urls,
            ..Message::default()
        })
    }

    /// Store uploaded files and attach them to a pending message.
    #[instrument(skip(self, message, files), fields(message_id = %message.id, count = files.len()))]
    pub async fn attach(&self, message: &mut Message, files: &[UploadedFile]) -> ServiceResult<()> {
        for file in files {
            let attachment = self
                .ctx
                .media()
                .store_attachment(NewAttachment {
                    id: self.ctx.generate_id(),
                    filename: &file.filename,
                    data: &file.data,
                })
                .await?;
            message.attachments.push(attachment);
        }
        Ok(())
    }

    /// Persist a prepared message and build the event announcing it.
    #[instrument(skip(self, message), fields(message_id = %message.id))]
    pub async fn finalize(&self, message: Message) -> ServiceResult<MessageAddEvent> {
        let mut tx = self.ctx.storage().begin().await?;
        tx.add_message(&message).await?;
        let mut stored = tx
            .message(message.id)
            .await?
            .ok_or_else(|| ServiceError::internal("message vanished after insert"))?;
        let reference = match stored.reference {
            Some(id) => tx.message(id).await?,
            None => None,
        };
        tx.commit().await?;

        stored.embeddable_urls = message.embeddable_urls;
        let author = self.ctx.index().user(stored.author);

        info!(channel_id = %stored.channel, "Message created");
        Ok(MessageAddEvent {
            message: stored,
            reference,
            author,
        })
    }

    /// Replace the content of one of the actor's own messages.
    #[instrument(skip(self, request), fields(message_id = %request.message))]
    pub async fn edit(&self, actor: Snowflake, request: MessageUpdateRequest) -> ServiceResult<MessageEdit> {
        request.validate()?;

        let mut tx = self.ctx.storage().begin().await?;
        let mut message = tx
            .message(request.message)
            .await?
            .ok_or(DomainError::MessageNotFound(request.message))?;
        if !message.is_author(actor) {
            return Err(DomainError::NotMessageAuthor.into());
        }

        let perms = self.ctx.index().channel_permissions(actor, message.channel);
        let parsed = parse_content(&request.content);

        let removed_embeds: Vec<Snowflake> = message
            .embeds
            .iter()
            .filter(|embed| !parsed.urls.contains(&embed.url))
            .map(|embed| embed.id)
            .collect();
        let added_urls: Vec<String> = parsed
            .urls
            .iter()
            .filter(|url| !message.embeds.iter().any(|embed| &embed.url == *url))
            .cloned()
            .collect();

        message.content = request.content;
        message.mentioned_users = parsed.users;
        message.mentioned_roles = parsed.roles;
        message.mentioned_channels = parsed.channels;
        message.edited_timestamp = Some(now_millis());

        tx.edit_message(&message, &removed_embeds).await?;
        let stored = tx
            .message(message.id)
            .await?
            .ok_or(DomainError::MessageNotFound(message.id))?;
        tx.commit().await?;

        let fetch_urls = if perms.has(Permissions::EMBED_LINKS) {
            added_urls
        } else {
            Vec::new()
        };
        debug!(removed = removed_embeds.len(), added = fetch_urls.len(), "Message edited");
        Ok(MessageEdit {
            message: stored,
            fetch_urls,
        })
    }

    /// Delete a message, returning the channel it was in.
    #[instrument(skip(self, request), fields(message_id = %request.message))]
    pub async fn delete(&self, actor: Snowflake, request: MessageDeleteRequest) -> ServiceResult<Snowflake> {
        let mut tx = self.ctx.storage().begin().await?;
        let message = tx
            .message(request.message)
            .await?
            .ok_or(DomainError::MessageNotFound(request.message))?;

        if !message.is_author(actor) {
            let perms = self.ctx.index().channel_permissions(actor, message.channel);
            require(perms, Permissions::MANAGE_MESSAGES)?;
        }

        tx.delete_message(message.id).await?;
        tx.commit().await?;

        info!(channel_id = %message.channel, "Message deleted");
        Ok(message.channel)
    }

    /// Fetch previews for `urls` and store the ones that produced something.
    ///
    /// Network calls happen before any transaction is opened. Returns the
    /// updated message, or `None` when nothing was stored or the message is
    /// gone.
    #[instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn fetch_embeds(&self, message_id: Snowflake, urls: &[String]) -> ServiceResult<Option<Message>> {
        let mut embeds = Vec::new();
        for url in urls {
            match self.ctx.embeds().fetch_embed(url).await {
                Ok(Some(mut embed)) => {
                    embed.id = self.ctx.generate_id();
                    embeds.push(embed);
                }
                Ok(None) => debug!(url = %url, "Nothing to preview"),
                Err(e) => warn!(url = %url, error = %e, "Link preview failed"),
            }
        }
        if embeds.is_empty() {
            return Ok(None);
        }

        let mut tx = self.ctx.storage().begin().await?;
        if tx.message(message_id).await?.is_none() {
            return Ok(None);
        }
        for embed in &embeds {
            tx.add_embed(message_id, embed).await?;
        }
        let message = tx.message(message_id).await?;
        tx.commit().await?;

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_limit() {
        assert_eq!(history_limit(0), DEFAULT_HISTORY_LIMIT);
        assert_eq!(history_limit(-4), DEFAULT_HISTORY_LIMIT);
        assert_eq!(history_limit(1), 1);
        assert_eq!(history_limit(75), 75);
        assert_eq!(history_limit(5000), MAX_HISTORY_LIMIT);
    }
}
