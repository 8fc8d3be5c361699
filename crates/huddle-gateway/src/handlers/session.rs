//! Introduction, login, registration, logout and presence bookkeeping

use std::sync::Arc;

use huddle_core::Snowflake;
use huddle_service::dto::{LoginRequest, RegisterRequest, TokenResponse, UserEvent};
use huddle_service::services::user::OVERVIEW_WINDOW;
use huddle_service::services::{AuthService, UserService};

use super::{report_error, HandlerError, HandlerResult, RequestContext};
use crate::connection::Connection;
use crate::protocol::EventType;
use crate::server::GatewayState;

/// Handles the session lifecycle of a connection
pub struct SessionHandler;

impl SessionHandler {
    /// First frames of every connection: try the handshake token, send the
    /// site settings, then the overview when logged in.
    pub async fn introduce(
        state: &GatewayState,
        connection: &Arc<Connection>,
        token: Option<&str>,
    ) -> HandlerResult<()> {
        let auth = AuthService::new(state.service_context());

        if let Some(token) = token.filter(|t| !t.is_empty()) {
            match auth.authenticate(token).await {
                Ok(user_id) => Self::authenticate(state, connection, user_id, token.to_string())?,
                Err(e) => report_error(connection, 0, None, &e.into()).await,
            }
        }

        let settings = auth.settings(connection.is_authenticated());
        connection
            .respond(EventType::SettingsResponse, None, &settings)
            .await?;

        if let Some(user_id) = connection.user_id() {
            Self::send_overview(state, connection, user_id).await?;
        }
        Ok(())
    }

    pub async fn login(cx: &RequestContext<'_>, request: LoginRequest) -> HandlerResult<()> {
        let (user_id, token) = AuthService::new(cx.services()).login(request).await?;

        Self::authenticate(cx.state, cx.connection, user_id, token.clone())?;
        cx.reply(EventType::TokenResponse, &TokenResponse { token }).await?;
        Self::send_overview(cx.state, cx.connection, user_id).await
    }

    pub async fn register(cx: &RequestContext<'_>, request: RegisterRequest) -> HandlerResult<()> {
        let (user, token) = AuthService::new(cx.services()).register(request).await?;
        let user_id = user.id;

        cx.registry().relay(EventType::UserAdd, &UserEvent { user });
        cx.registry().fanout_user_list();

        Self::authenticate(cx.state, cx.connection, user_id, token.clone())?;
        cx.reply(EventType::TokenResponse, &TokenResponse { token }).await?;
        Self::send_overview(cx.state, cx.connection, user_id).await
    }

    /// Revoke the connection's token and close it.
    pub async fn logout(cx: &RequestContext<'_>, actor: Snowflake) -> HandlerResult<()> {
        let token = cx.connection.token().ok_or(HandlerError::NotAuthenticated)?;
        AuthService::new(cx.services()).logout(&token).await?;

        tracing::info!(session_id = %cx.connection.session_id(), user_id = %actor, "Logged out");
        cx.connection.close(cx.state.config().close_timeout).await;
        Ok(())
    }

    /// Move the connection to `Authenticated`. The registry brings the user
    /// online with their first session.
    pub fn authenticate(
        state: &GatewayState,
        connection: &Arc<Connection>,
        user_id: Snowflake,
        token: String,
    ) -> HandlerResult<()> {
        if !connection.authenticate(user_id, token) {
            return Err(HandlerError::AlreadyAuthenticated);
        }
        connection.set_user_list_window(0, OVERVIEW_WINDOW);

        state.registry().bind_user(connection.session_id(), user_id);

        tracing::info!(
            session_id = %connection.session_id(),
            user_id = %user_id,
            "Connection authenticated"
        );
        Ok(())
    }

    pub async fn send_overview(
        state: &GatewayState,
        connection: &Connection,
        user_id: Snowflake,
    ) -> HandlerResult<()> {
        let overview = UserService::new(state.service_context()).overview(user_id)?;
        connection
            .respond(EventType::OverviewResponse, None, &overview)
            .await?;
        Ok(())
    }

    /// Forget a closed connection; the user goes offline with their last one.
    pub fn disconnect(state: &GatewayState, connection: &Connection) {
        if let Some(user) = state.registry().remove(connection.session_id()) {
            tracing::debug!(user_id = %user.id, "Last session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::connection::test_connection;
    use crate::handlers::test_support::test_gateway;
    use crate::handlers::RequestDispatcher;
    use axum::extract::ws::Message;
    use huddle_core::{ErrorCode, Presence};

    fn decode(message: Option<Message>) -> serde_json::Value {
        match message {
            Some(Message::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    async fn register(state: &GatewayState, name: &str) -> String {
        let (conn, _queue, mut socket) = test_connection(16);
        state.registry().add(Arc::clone(&conn));
        let frame = format!(
            r#"{{"type":34,"data":{{"username":"{name}","password":"correct horse"}}}}"#
        );
        RequestDispatcher::handle_frame(state, &conn, &frame).await;
        let token = decode(socket.next().await);
        SessionHandler::disconnect(state, &conn);
        token["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_introduction_without_token() {
        let gw = test_gateway().await;
        let (conn, _queue, mut socket) = test_connection(4);

        SessionHandler::introduce(&gw.state, &conn, None).await.unwrap();
        let settings = decode(socket.next().await);
        assert_eq!(settings["type"], 1);
        assert_eq!(settings["data"]["authenticated"], false);
        assert!(!conn.is_authenticated());
    }

    #[tokio::test]
    async fn test_introduction_with_bad_token() {
        let gw = test_gateway().await;
        let (conn, _queue, mut socket) = test_connection(4);

        SessionHandler::introduce(&gw.state, &conn, Some("deadbeef")).await.unwrap();
        let error = decode(socket.next().await);
        assert_eq!(error["type"], 0);
        assert_eq!(error["data"]["code"], ErrorCode::InvalidToken as u8);
        let settings = decode(socket.next().await);
        assert_eq!(settings["data"]["authenticated"], false);
    }

    #[tokio::test]
    async fn test_introduction_with_token_sends_overview() {
        let gw = test_gateway().await;
        let token = register(&gw.state, "carol").await;

        let (conn, _queue, mut socket) = test_connection(4);
        gw.state.registry().add(Arc::clone(&conn));
        SessionHandler::introduce(&gw.state, &conn, Some(&token)).await.unwrap();

        assert_eq!(decode(socket.next().await)["data"]["authenticated"], true);
        let overview = decode(socket.next().await);
        assert_eq!(overview["type"], 2);
        assert_eq!(overview["data"]["you"]["username"], "carol");
        assert!(conn.is_authenticated());
    }

    #[tokio::test]
    async fn test_presence_follows_sessions() {
        let gw = test_gateway().await;
        let token = register(&gw.state, "dave").await;
        let index = gw.state.service_context().index();
        let user_id = AuthService::new(gw.state.service_context())
            .authenticate(&token)
            .await
            .unwrap();
        assert_eq!(index.user(user_id).unwrap().presence, Presence::Offline);

        let (a, _qa, _sa) = test_connection(16);
        let (b, _qb, _sb) = test_connection(16);
        for conn in [&a, &b] {
            gw.state.registry().add(Arc::clone(conn));
            SessionHandler::authenticate(&gw.state, conn, user_id, token.clone()).unwrap();
        }
        assert_eq!(index.user(user_id).unwrap().presence, Presence::Online);

        SessionHandler::disconnect(&gw.state, &a);
        assert_eq!(index.user(user_id).unwrap().presence, Presence::Online);
        SessionHandler::disconnect(&gw.state, &b);
        assert_eq!(index.user(user_id).unwrap().presence, Presence::Offline);
    }

    #[tokio::test]
    async fn test_logout_revokes_and_closes() {
        let gw = test_gateway().await;
        let token = register(&gw.state, "erin").await;

        let (conn, _queue, _socket) = test_connection(4);
        gw.state.registry().add(Arc::clone(&conn));
        SessionHandler::introduce(&gw.state, &conn, Some(&token)).await.unwrap();

        RequestDispatcher::handle_frame(&gw.state, &conn, r#"{"type":33,"seq":"o"}"#).await;
        assert!(conn.is_closing());
        assert!(AuthService::new(gw.state.service_context())
            .authenticate(&token)
            .await
            .is_err());
    }
}
