//! Message and reaction handlers

use std::sync::Arc;

use huddle_core::{Message, Snowflake};
use huddle_service::dto::{
    MessageDeleteEvent, MessageDeleteRequest, MessageSendRequest, MessageSendResponse,
    MessageUpdateEvent, MessageUpdateRequest, MessagesRequest, ReactionRequest,
};
use huddle_service::services::{MessageEdit, MessageService, ReactionService};

use super::{HandlerResult, RequestContext};
use crate::connection::{Connection, PendingUpload};
use crate::protocol::EventType;
use crate::server::GatewayState;

/// Handles message history, sending, editing, deletion and reactions
pub struct MessageHandler;

impl MessageHandler {
    pub async fn history(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: MessagesRequest,
    ) -> HandlerResult<()> {
        let page = MessageService::new(cx.services()).history(actor, request).await?;
        cx.reply(EventType::MessagesResponse, &page).await
    }

    /// Send a message. With attachments announced the message is parked
    /// until its files arrive on the upload endpoint.
    pub async fn send(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: MessageSendRequest,
    ) -> HandlerResult<()> {
        let deferred = request.attachment_count > 0;
        let message = MessageService::new(cx.services()).prepare(actor, request)?;

        if deferred {
            cx.reserve_upload(PendingUpload::MessageSend(message)).await
        } else {
            Self::finalize(cx.state, Some(cx.connection), cx.seq, message).await
        }
    }

    /// Store a prepared message, acknowledge it to its sender when still
    /// connected, and relay it to the channel.
    pub async fn finalize(
        state: &GatewayState,
        connection: Option<&Arc<Connection>>,
        seq: Option<&str>,
        message: Message,
    ) -> HandlerResult<()> {
        let event = MessageService::new(state.service_context())
            .finalize(message)
            .await?;
        let id = event.message.id;
        let channel = event.message.channel;

        if let Some(connection) = connection {
            let ack = MessageSendResponse { message: id };
            if let Err(e) = connection.respond(EventType::MessageSendResponse, seq, &ack).await {
                tracing::debug!(
                    session_id = %connection.session_id(),
                    message_id = %id,
                    error = %e,
                    "Sender gone before acknowledgement"
                );
            }
        }

        state
            .registry()
            .relay_by_channel(EventType::MessageAdd, &event, channel);

        if !event.message.embeddable_urls.is_empty() {
            Self::spawn_embeds(state, id, channel, event.message.embeddable_urls);
        }
        Ok(())
    }

    pub async fn edit(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: MessageUpdateRequest,
    ) -> HandlerResult<()> {
        let MessageEdit {
            message,
            fetch_urls,
        } = MessageService::new(cx.services()).edit(actor, request).await?;
        let id = message.id;
        let channel = message.channel;

        cx.registry().relay_by_channel(
            EventType::MessageUpdate,
            &MessageUpdateEvent { message },
            channel,
        );
        if !fetch_urls.is_empty() {
            Self::spawn_embeds(cx.state, id, channel, fetch_urls);
        }
        Ok(())
    }

    pub async fn delete(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: MessageDeleteRequest,
    ) -> HandlerResult<()> {
        let message = request.message;
        let channel = MessageService::new(cx.services()).delete(actor, request).await?;
        cx.registry().relay_by_channel(
            EventType::MessageDelete,
            &MessageDeleteEvent { message },
            channel,
        );
        Ok(())
    }

    pub async fn react(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: ReactionRequest,
    ) -> HandlerResult<()> {
        let (event, channel) = ReactionService::new(cx.services()).add(actor, request).await?;
        cx.registry()
            .relay_by_channel(EventType::ReactionAdd, &event, channel);
        Ok(())
    }

    pub async fn unreact(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: ReactionRequest,
    ) -> HandlerResult<()> {
        let (event, channel) = ReactionService::new(cx.services())
            .delete(actor, request)
            .await?;
        cx.registry()
            .relay_by_channel(EventType::ReactionDelete, &event, channel);
        Ok(())
    }

    pub async fn reactors(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: ReactionRequest,
    ) -> HandlerResult<()> {
        let users = ReactionService::new(cx.services()).users(actor, request).await?;
        cx.reply(EventType::ReactionUsersResponse, &users).await
    }

    /// Fetch link previews off the request path and relay the updated
    /// message. Abandoned on shutdown.
    fn spawn_embeds(state: &GatewayState, message_id: Snowflake, channel: Snowflake, urls: Vec<String>) {
        let state = state.clone();
        tokio::spawn(async move {
            let shutdown = state.shutdown().clone();
            let messages = MessageService::new(state.service_context());
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::debug!(message_id = %message_id, "Link previews abandoned on shutdown");
                }
                result = messages.fetch_embeds(message_id, &urls) => match result {
                    Ok(Some(message)) => {
                        state.registry().relay_by_channel(
                            EventType::MessageUpdate,
                            &MessageUpdateEvent { message },
                            channel,
                        );
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(message_id = %message_id, error = %e, "Storing link previews failed");
                    }
                },
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{channel_id, connect_user, next_event, next_reply, test_gateway};
    use crate::handlers::RequestDispatcher;
    use huddle_core::{ErrorCode, Permissions, Settings};
    use serde_json::json;

    #[tokio::test]
    async fn test_send_acknowledges_and_relays() {
        let gw = test_gateway().await;
        let mut alice = connect_user(&gw.state, "alice").await;
        let channel = channel_id(&gw.state);

        let frame = json!({"type": 9, "seq": "m1", "data": {"channel": channel, "content": "hello"}});
        RequestDispatcher::handle_frame(&gw.state, &alice.conn, &frame.to_string()).await;

        let ack = next_reply(&mut alice.socket).await;
        assert_eq!(ack["type"], 10);
        assert_eq!(ack["seq"], "m1");

        let added = next_event(&mut alice.queue, 11).await;
        assert_eq!(added["data"]["message"]["content"], "hello");
        assert_eq!(added["data"]["author"]["username"], "alice");
        assert_eq!(added["data"]["message"]["id"], ack["data"]["message"]);
    }

    #[tokio::test]
    async fn test_attachment_without_upload_permission() {
        let gw = test_gateway().await;
        let index = gw.state.service_context().index();
        let mut settings: Settings = index.settings();
        settings.default_permissions = Permissions::DEFAULT - Permissions::UPLOAD_FILES;
        index.set_settings(settings);

        let mut bob = connect_user(&gw.state, "bob").await;
        let channel = channel_id(&gw.state);
        let frame = json!({
            "type": 9,
            "seq": "m2",
            "data": {"channel": channel, "content": "pic", "attachmentCount": 1}
        });
        RequestDispatcher::handle_frame(&gw.state, &bob.conn, &frame.to_string()).await;

        let error = next_reply(&mut bob.socket).await;
        assert_eq!(error["type"], 0);
        assert_eq!(error["seq"], "m2");
        assert_eq!(error["data"]["code"], ErrorCode::NoPermission as u8);
        assert!(gw.state.registry().pending().is_empty());
    }

    #[tokio::test]
    async fn test_attachment_reserves_slot() {
        let gw = test_gateway().await;
        let mut carol = connect_user(&gw.state, "carol").await;
        let channel = channel_id(&gw.state);
        let frame = json!({
            "type": 9,
            "seq": "m3",
            "data": {"channel": channel, "content": "", "attachmentCount": 2}
        });
        RequestDispatcher::handle_frame(&gw.state, &carol.conn, &frame.to_string()).await;

        let slot = next_reply(&mut carol.socket).await;
        assert_eq!(slot["type"], 35);
        assert_eq!(slot["seq"], "m3");
        assert_eq!(gw.state.registry().pending().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_relays_to_channel() {
        let gw = test_gateway().await;
        let mut dave = connect_user(&gw.state, "dave").await;
        let channel = channel_id(&gw.state);

        let send = json!({"type": 9, "seq": "s", "data": {"channel": channel, "content": "oops"}});
        RequestDispatcher::handle_frame(&gw.state, &dave.conn, &send.to_string()).await;
        let id = next_reply(&mut dave.socket).await["data"]["message"].clone();

        let delete = json!({"type": 37, "seq": "d", "data": {"message": id}});
        RequestDispatcher::handle_frame(&gw.state, &dave.conn, &delete.to_string()).await;
        let deleted = next_event(&mut dave.queue, 13).await;
        assert_eq!(deleted["data"]["message"], id);
    }

    #[tokio::test]
    async fn test_others_cannot_edit() {
        let gw = test_gateway().await;
        let mut erin = connect_user(&gw.state, "erin").await;
        let mut frank = connect_user(&gw.state, "frank").await;
        let channel = channel_id(&gw.state);

        let send = json!({"type": 9, "seq": "s", "data": {"channel": channel, "content": "mine"}});
        RequestDispatcher::handle_frame(&gw.state, &erin.conn, &send.to_string()).await;
        let id = next_reply(&mut erin.socket).await["data"]["message"].clone();

        let edit = json!({"type": 36, "seq": "e", "data": {"message": id, "content": "yours"}});
        RequestDispatcher::handle_frame(&gw.state, &frank.conn, &edit.to_string()).await;
        let error = next_reply(&mut frank.socket).await;
        assert_eq!(error["data"]["code"], ErrorCode::NoPermission as u8);
        assert_eq!(error["data"]["request"], 36);
    }

    #[tokio::test]
    async fn test_reactions_relay_and_list() {
        let gw = test_gateway().await;
        let mut gina = connect_user(&gw.state, "gina").await;
        let channel = channel_id(&gw.state);

        let send = json!({"type": 9, "seq": "s", "data": {"channel": channel, "content": "vote"}});
        RequestDispatcher::handle_frame(&gw.state, &gina.conn, &send.to_string()).await;
        let id = next_reply(&mut gina.socket).await["data"]["message"].clone();

        let react = json!({"type": 38, "seq": "r", "data": {"message": id, "emoji": "1"}});
        RequestDispatcher::handle_frame(&gw.state, &gina.conn, &react.to_string()).await;
        let added = next_event(&mut gina.queue, 15).await;
        assert_eq!(added["data"]["user"], gina.user_id.to_string());

        let list = json!({"type": 40, "seq": "u", "data": {"message": id, "emoji": "1"}});
        RequestDispatcher::handle_frame(&gw.state, &gina.conn, &list.to_string()).await;
        let users = next_reply(&mut gina.socket).await;
        assert_eq!(users["type"], 41);
        assert_eq!(users["data"]["users"][0], gina.user_id.to_string());
    }
}
