//! Reaction service

use huddle_core::{DomainError, Permissions, Snowflake};
use tracing::{debug, instrument};

use crate::dto::{ReactionEvent, ReactionRequest, ReactionUsersResponse};

use super::context::ServiceContext;
use super::error::{require, ServiceResult};

/// Reaction service
pub struct ReactionService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ReactionService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// React to a message. Joining an existing reaction needs no permission;
    /// starting a new one needs `ADD_REACTIONS`. Returns the event and the
    /// channel to relay it in.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        actor: Snowflake,
        request: ReactionRequest,
    ) -> ServiceResult<(ReactionEvent, Snowflake)> {
        let mut tx = self.ctx.storage().begin().await?;
        let message = tx
            .message(request.message)
            .await?
            .ok_or(DomainError::MessageNotFound(request.message))?;

        let count = tx.reaction_count(message.id, request.emoji).await?;
        if count == 0 {
            let perms = self.ctx.index().channel_permissions(actor, message.channel);
            require(perms, Permissions::ADD_REACTIONS)?;
        }

        tx.add_reaction(message.id, actor, request.emoji).await?;
        tx.commit().await?;

        debug!(channel_id = %message.channel, "Reaction added");
        Ok((
            ReactionEvent {
                message: message.id,
                user: actor,
                emoji: request.emoji,
            },
            message.channel,
        ))
    }

    /// Remove the actor's own reaction.
    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        actor: Snowflake,
        request: ReactionRequest,
    ) -> ServiceResult<(ReactionEvent, Snowflake)> {
        let mut tx = self.ctx.storage().begin().await?;
        let message = tx
            .message(request.message)
            .await?
            .ok_or(DomainError::MessageNotFound(request.message))?;

        tx.delete_reaction(message.id, actor, request.emoji).await?;
        tx.commit().await?;

        Ok((
            ReactionEvent {
                message: message.id,
                user: actor,
                emoji: request.emoji,
            },
            message.channel,
        ))
    }

    /// Everyone who reacted with an emoji, in reaction order.
    #[instrument(skip(self))]
    pub async fn users(
        &self,
        actor: Snowflake,
        request: ReactionRequest,
    ) -> ServiceResult<ReactionUsersResponse> {
        let mut tx = self.ctx.storage().begin().await?;
        let message = tx
            .message(request.message)
            .await?
            .ok_or(DomainError::MessageNotFound(request.message))?;
        let perms = self.ctx.index().channel_permissions(actor, message.channel);
        require(perms, Permissions::VIEW_CHANNEL)?;

        let users = tx.reaction_users(message.id, request.emoji).await?;
        tx.commit().await?;

        Ok(ReactionUsersResponse {
            message: message.id,
            emoji: request.emoji,
            users,
        })
    }
}
