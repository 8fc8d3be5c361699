//! Channel service

use huddle_core::{Channel, DomainError, Permissions, Snowflake};
use tracing::{info, instrument};
use validator::Validate;

use crate::dto::{ChannelAddRequest, ChannelDeleteRequest, ChannelUpdateRequest};

use super::context::ServiceContext;
use super::error::{require, ServiceError, ServiceResult};

/// Channel service
pub struct ChannelService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ChannelService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    fn require_manage(&self, actor: Snowflake) -> ServiceResult<()> {
        require(self.ctx.index().permissions(actor), Permissions::MANAGE_CHANNELS)
    }

    fn check_parent(&self, channel: &Channel) -> ServiceResult<()> {
        match channel.parent {
            Some(parent) if parent == channel.id => {
                Err(ServiceError::invalid_request("channel cannot be its own parent"))
            }
            Some(parent) if self.ctx.index().channel(parent).is_none() => {
                Err(DomainError::ChannelNotFound(parent).into())
            }
            _ => Ok(()),
        }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn add(&self, actor: Snowflake, request: ChannelAddRequest) -> ServiceResult<Channel> {
        request.validate()?;
        self.require_manage(actor)?;

        let channel = Channel {
            id: self.ctx.generate_id(),
            kind: request.kind,
            name: request.name,
            description: request.description,
            position: request.position,
            parent: request.parent.and_then(Snowflake::non_zero),
            overwrites: request.overwrites,
        };
        self.check_parent(&channel)?;

        let mut tx = self.ctx.storage().begin().await?;
        tx.add_channel(&channel).await?;
        let channel = tx
            .channel(channel.id)
            .await?
            .ok_or(DomainError::ChannelNotFound(channel.id))?;
        tx.commit().await?;

        self.ctx.index().add_channel(channel.clone());
        info!(channel_id = %channel.id, "Channel created");
        Ok(channel)
    }

    /// Replace a channel, overwrites included
    #[instrument(skip(self, request), fields(channel_id = %request.channel.id))]
    pub async fn update(
        &self,
        actor: Snowflake,
        request: ChannelUpdateRequest,
    ) -> ServiceResult<Channel> {
        self.require_manage(actor)?;
        let mut channel = request.channel;
        if channel.name.trim().is_empty() {
            return Err(ServiceError::invalid_request("channel name must not be empty"));
        }
        channel.parent = channel.parent.and_then(Snowflake::non_zero);
        self.check_parent(&channel)?;

        let mut tx = self.ctx.storage().begin().await?;
        if tx.channel(channel.id).await?.is_none() {
            return Err(DomainError::ChannelNotFound(channel.id).into());
        }
        tx.update_channel(&channel).await?;
        let channel = tx
            .channel(channel.id)
            .await?
            .ok_or(DomainError::ChannelNotFound(channel.id))?;
        tx.commit().await?;

        self.ctx.index().update_channel(channel.clone());
        info!("Channel updated");
        Ok(channel)
    }

    /// Delete a channel together with its history
    #[instrument(skip(self, request), fields(channel_id = %request.channel))]
    pub async fn delete(
        &self,
        actor: Snowflake,
        request: ChannelDeleteRequest,
    ) -> ServiceResult<Snowflake> {
        self.require_manage(actor)?;

        let mut tx = self.ctx.storage().begin().await?;
        if tx.channel(request.channel).await?.is_none() {
            return Err(DomainError::ChannelNotFound(request.channel).into());
        }
        tx.delete_channel(request.channel).await?;
        tx.commit().await?;

        self.ctx.index().delete_channel(request.channel);
        info!("Channel deleted");
        Ok(request.channel)
    }
}
