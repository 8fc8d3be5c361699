//! User lookups, the member list and profile changes

use huddle_core::Snowflake;
use huddle_service::dto::{UserEvent, UserListRequest, UserUpdateRequest, UsersRequest};
use huddle_service::services::{PreparedProfile, UserService};

use super::{HandlerResult, RequestContext};
use crate::connection::PendingUpload;
use crate::protocol::EventType;
use crate::server::GatewayState;

pub struct UserHandler;

impl UserHandler {
    pub async fn users(cx: &RequestContext<'_>, request: UsersRequest) -> HandlerResult<()> {
        let users = UserService::new(cx.services()).users(&request.users);
        cx.reply(EventType::UsersResponse, &users).await
    }

    /// Answer with a window of the member list and remember it, so later
    /// changes inside the window are pushed to this connection.
    pub async fn user_list(cx: &RequestContext<'_>, request: UserListRequest) -> HandlerResult<()> {
        cx.connection.set_user_list_window(request.start, request.end);
        let slice = UserService::new(cx.services()).user_list(request.start, request.end);
        cx.reply(EventType::UserListResponse, &slice).await
    }

    pub async fn update(
        cx: &RequestContext<'_>,
        actor: Snowflake,
        request: UserUpdateRequest,
    ) -> HandlerResult<()> {
        let prepared = UserService::new(cx.services()).prepare_update(actor, request)?;
        if prepared.needs_avatar {
            cx.reserve_upload(PendingUpload::UserUpdate(prepared)).await
        } else {
            Self::finalize(cx.state, prepared).await
        }
    }

    /// Write the profile and announce it to everyone.
    pub async fn finalize(state: &GatewayState, prepared: PreparedProfile) -> HandlerResult<()> {
        let user = UserService::new(state.service_context())
            .finalize_update(prepared)
            .await?;
        let registry = state.registry();
        registry.relay(EventType::UserUpdate, &UserEvent { user });
        registry.fanout_user_list();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{connect_user, has_event, next_event, next_reply, test_gateway};
    use crate::handlers::RequestDispatcher;
    use huddle_core::ErrorCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_users_lookup_skips_unknown() {
        let gw = test_gateway().await;
        let mut alice = connect_user(&gw.state, "alice").await;

        let frame = json!({"type": 5, "seq": "u", "data": {"users": [alice.user_id, "999"]}});
        RequestDispatcher::handle_frame(&gw.state, &alice.conn, &frame.to_string()).await;
        let reply = next_reply(&mut alice.socket).await;
        assert_eq!(reply["type"], 6);
        assert_eq!(reply["data"]["users"].as_array().unwrap().len(), 1);
        assert_eq!(reply["data"]["users"][0]["username"], "alice");
    }

    #[tokio::test]
    async fn test_user_list_records_window() {
        let gw = test_gateway().await;
        let mut bob = connect_user(&gw.state, "bob").await;

        let frame = json!({"type": 7, "seq": "l", "data": {"start": 0, "end": 50}});
        RequestDispatcher::handle_frame(&gw.state, &bob.conn, &frame.to_string()).await;
        let reply = next_reply(&mut bob.socket).await;
        assert_eq!(reply["type"], 8);
        assert_eq!(reply["seq"], "l");
        assert_eq!(bob.conn.user_list_window().map(|w| w.to), Some(50));

        // A newcomer lands inside the window
        connect_user(&gw.state, "carol").await;
        assert!(has_event(&mut bob.queue, 8).await);
    }

    #[tokio::test]
    async fn test_profile_update_relays() {
        let gw = test_gateway().await;
        let mut dave = connect_user(&gw.state, "dave").await;

        let frame = json!({
            "type": 42,
            "seq": "p",
            "data": {"user": dave.user_id, "setName": true, "displayName": "Dave!"}
        });
        RequestDispatcher::handle_frame(&gw.state, &dave.conn, &frame.to_string()).await;
        let update = next_event(&mut dave.queue, 28).await;
        assert_eq!(update["data"]["user"]["displayName"], "Dave!");
        assert_eq!(
            gw.state.service_context().index().user(dave.user_id).unwrap().display_name,
            "Dave!"
        );
    }

    #[tokio::test]
    async fn test_avatar_update_reserves_slot() {
        let gw = test_gateway().await;
        let mut erin = connect_user(&gw.state, "erin").await;

        let frame = json!({
            "type": 42,
            "seq": "a",
            "data": {"user": erin.user_id, "setAvatar": true, "avatarModified": 1}
        });
        RequestDispatcher::handle_frame(&gw.state, &erin.conn, &frame.to_string()).await;
        let slot = next_reply(&mut erin.socket).await;
        assert_eq!(slot["type"], 35);
        assert_eq!(gw.state.registry().pending().len(), 1);
    }

    #[tokio::test]
    async fn test_cannot_edit_someone_else_without_permission() {
        let gw = test_gateway().await;
        let frank = connect_user(&gw.state, "frank").await;
        let mut gina = connect_user(&gw.state, "gina").await;

        let frame = json!({
            "type": 42,
            "seq": "x",
            "data": {"user": frank.user_id, "setName": true, "displayName": "hacked"}
        });
        RequestDispatcher::handle_frame(&gw.state, &gina.conn, &frame.to_string()).await;
        let error = next_reply(&mut gina.socket).await;
        assert_eq!(error["data"]["code"], ErrorCode::NoPermission as u8);
    }
}
