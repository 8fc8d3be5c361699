//! Role, channel and invite administration
//!
//! Role changes are announced to everyone. Channel additions reach only
//! those who can see the channel. An update reaches everyone who could see
//! it before or after, as an add or delete when visibility changed.
//! Deletions go to everyone so stale copies disappear.

use huddle_core::Snowflake;
use huddle_service::dto::{
    ChannelAddRequest, ChannelDeleteEvent, ChannelDeleteRequest, ChannelEvent,
    ChannelUpdateRequest, RoleAddRequest, RoleDeleteEvent, RoleDeleteRequest, RoleEvent,
    RoleUpdateRequest, UserEvent, UserRoleRequest,
};
use huddle_service::services::{ChannelService, InviteService, RoleService};

use super::{HandlerResult, RequestContext};
use crate::protocol::EventType;

pub struct AdminHandler;

impl AdminHandler {
    pub async fn role_add(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: RoleAddRequest,
    ) -> HandlerResult<()> {
        let role = RoleService::new(cx.services()).add(actor, request).await?;
        cx.registry().relay(EventType::RoleAdd, &RoleEvent { role });
        cx.registry().fanout_user_list();
        Ok(())
    }

    pub async fn role_update(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: RoleUpdateRequest,
    ) -> HandlerResult<()> {
        let role = RoleService::new(cx.services()).update(actor, request).await?;
        cx.registry().relay(EventType::RoleUpdate, &RoleEvent { role });
        cx.registry().fanout_user_list();
        Ok(())
    }

    pub async fn role_delete(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: RoleDeleteRequest,
    ) -> HandlerResult<()> {
        let role = RoleService::new(cx.services()).delete(actor, request).await?;
        cx.registry().relay(EventType::RoleDelete, &RoleDeleteEvent { role });
        cx.registry().fanout_user_list();
        Ok(())
    }

    pub async fn user_role_add(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: UserRoleRequest,
    ) -> HandlerResult<()> {
        let changed = RoleService::new(cx.services())
            .add_user_role(actor, request)
            .await?;
        Self::announce_user(cx, changed);
        Ok(())
    }

    pub async fn user_role_delete(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: UserRoleRequest,
    ) -> HandlerResult<()> {
        let changed = RoleService::new(cx.services())
            .remove_user_role(actor, request)
            .await?;
        Self::announce_user(cx, changed);
        Ok(())
    }

    // Nothing to announce when the user already was in the requested state
    fn announce_user(cx: &RequestContext<'_>, changed: Option<huddle_core::User>) {
        if let Some(user) = changed {
            cx.registry().relay(EventType::UserUpdate, &UserEvent { user });
            cx.registry().fanout_user_list();
        }
    }

    pub async fn channel_add(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: ChannelAddRequest,
    ) -> HandlerResult<()> {
        let channel = ChannelService::new(cx.services()).add(actor, request).await?;
        let id = channel.id;
        cx.registry()
            .relay_by_channel(EventType::ChannelAdd, &ChannelEvent { channel }, id);
        Ok(())
    }

    pub async fn channel_update(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: ChannelUpdateRequest,
    ) -> HandlerResult<()> {
        let viewers = cx.registry().channel_viewers(request.channel.id);
        let channel = ChannelService::new(cx.services())
            .update(actor, request)
            .await?;
        cx.registry().relay_channel_update(&channel, &viewers);
        Ok(())
    }

    pub async fn channel_delete(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: ChannelDeleteRequest,
    ) -> HandlerResult<()> {
        let channel = ChannelService::new(cx.services())
            .delete(actor, request)
            .await?;
        cx.registry()
            .relay(EventType::ChannelDelete, &ChannelDeleteEvent { channel });
        Ok(())
    }

    pub async fn invite_create(cx: &RequestContext<'_>, actor: Snowflake) -> HandlerResult<()> {
        let invite = InviteService::new(cx.services()).create(actor).await?;
        cx.reply(EventType::InviteCreateResponse, &invite).await
    }
}
