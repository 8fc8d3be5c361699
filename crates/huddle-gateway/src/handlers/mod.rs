//! Request handlers
//!
//! Every client request is decoded into a [`Request`] and dispatched through
//! one exhaustive match. Failures become an ErrorResponse echoing the
//! request's `seq`; they never close the connection.

mod admin;
mod error;
mod messages;
mod session;
mod uploads;
mod users;

pub use admin::AdminHandler;
pub use error::{HandlerError, HandlerResult};
pub use messages::MessageHandler;
pub use session::SessionHandler;
pub use uploads::UploadHandler;
pub use users::UserHandler;

use std::sync::Arc;

use huddle_core::Snowflake;
use huddle_service::dto::ErrorResponse;
use huddle_service::ServiceContext;
use serde::Serialize;

use crate::connection::{Connection, PendingRequest, PendingUpload};
use crate::protocol::{EventType, IncomingFrame, Request};
use crate::registry::Registry;
use crate::server::GatewayState;

/// Everything a handler needs to answer one request
pub struct RequestContext<'a> {
    pub state: &'a GatewayState,
    pub connection: &'a Arc<Connection>,
    /// Correlation token of the request being answered
    pub seq: Option<&'a str>,
}

impl<'a> RequestContext<'a> {
    pub fn new(state: &'a GatewayState, connection: &'a Arc<Connection>, seq: Option<&'a str>) -> Self {
        Self {
            state,
            connection,
            seq,
        }
    }

    pub fn services(&self) -> &'a ServiceContext {
        self.state.service_context()
    }

    pub fn registry(&self) -> &'a Arc<Registry> {
        self.state.registry()
    }

    /// The logged-in user of this connection
    pub fn actor(&self) -> HandlerResult<Snowflake> {
        if !self.connection.is_authenticated() {
            return Err(HandlerError::NotAuthenticated);
        }
        self.connection.user_id().ok_or(HandlerError::NotAuthenticated)
    }

    /// Answer the request directly, echoing its `seq`.
    pub async fn reply<T: Serialize>(&self, kind: EventType, data: &T) -> HandlerResult<()> {
        self.connection.respond(kind, self.seq, data).await?;
        Ok(())
    }

    /// Park a partially built request and hand the client its upload slot.
    pub async fn reserve_upload(&self, upload: PendingUpload) -> HandlerResult<()> {
        let slot = self.services().generate_id();
        let request = PendingRequest::new(
            self.connection.session_id(),
            self.seq.map(str::to_owned),
            upload,
        );
        tracing::debug!(
            session_id = %self.connection.session_id(),
            slot = %slot,
            request = %request.kind(),
            "Upload slot reserved"
        );
        self.registry().pending().insert(slot, request);
        self.reply(
            EventType::UploadSlotResponse,
            &huddle_service::dto::UploadSlotResponse { slot },
        )
        .await
    }
}

/// Dispatch incoming client frames to the appropriate handlers
pub struct RequestDispatcher;

impl RequestDispatcher {
    /// Decode, dispatch and answer one text frame.
    pub async fn handle_frame(state: &GatewayState, connection: &Arc<Connection>, text: &str) {
        let frame = match IncomingFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                report_error(connection, 0, None, &e.into()).await;
                return;
            }
        };

        let kind = frame.kind;
        let seq = frame.seq.clone();
        tracing::trace!(session_id = %connection.session_id(), kind, "Received frame");

        let result = match Request::from_frame(frame) {
            Ok(request) => {
                let cx = RequestContext::new(state, connection, seq.as_deref());
                Self::dispatch(&cx, request).await
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            report_error(connection, kind, seq.as_deref(), &e).await;
        }
    }

    /// Run one decoded request. Only login and registration are accepted
    /// before authentication, and only then.
    pub async fn dispatch(cx: &RequestContext<'_>, request: Request) -> HandlerResult<()> {
        match request {
            Request::Login(req) => {
                require_unauthenticated(cx)?;
                SessionHandler::login(cx, req).await
            }
            Request::Register(req) => {
                require_unauthenticated(cx)?;
                SessionHandler::register(cx, req).await
            }
            Request::Logout => SessionHandler::logout(cx, cx.actor()?).await,

            Request::Messages(req) => MessageHandler::history(cx, cx.actor()?, req).await,
            Request::MessageSend(req) => MessageHandler::send(cx, cx.actor()?, req).await,
            Request::MessageUpdate(req) => MessageHandler::edit(cx, cx.actor()?, req).await,
            Request::MessageDelete(req) => MessageHandler::delete(cx, cx.actor()?, req).await,
            Request::ReactionAdd(req) => MessageHandler::react(cx, cx.actor()?, req).await,
            Request::ReactionDelete(req) => MessageHandler::unreact(cx, cx.actor()?, req).await,
            Request::ReactionUsers(req) => MessageHandler::reactors(cx, cx.actor()?, req).await,

            Request::Users(req) => {
                cx.actor()?;
                UserHandler::users(cx, req).await
            }
            Request::UserList(req) => {
                cx.actor()?;
                UserHandler::user_list(cx, req).await
            }
            Request::UserUpdate(req) => UserHandler::update(cx, cx.actor()?, req).await,

            Request::RoleAdd(req) => AdminHandler::role_add(cx, cx.actor()?, req).await,
            Request::RoleUpdate(req) => AdminHandler::role_update(cx, cx.actor()?, req).await,
            Request::RoleDelete(req) => AdminHandler::role_delete(cx, cx.actor()?, req).await,
            Request::UserRoleAdd(req) => AdminHandler::user_role_add(cx, cx.actor()?, req).await,
            Request::UserRoleDelete(req) => {
                AdminHandler::user_role_delete(cx, cx.actor()?, req).await
            }
            Request::ChannelAdd(req) => AdminHandler::channel_add(cx, cx.actor()?, req).await,
            Request::ChannelUpdate(req) => AdminHandler::channel_update(cx, cx.actor()?, req).await,
            Request::ChannelDelete(req) => AdminHandler::channel_delete(cx, cx.actor()?, req).await,
            Request::InviteCreate => AdminHandler::invite_create(cx, cx.actor()?).await,
        }
    }
}

fn require_unauthenticated(cx: &RequestContext<'_>) -> HandlerResult<()> {
    if cx.connection.is_authenticated() {
        return Err(HandlerError::AlreadyAuthenticated);
    }
    Ok(())
}

/// Send an ErrorResponse for a failed request. Internal errors are logged
/// with their full chain; everything else is an expected outcome.
pub async fn report_error(
    connection: &Connection,
    request: u16,
    seq: Option<&str>,
    error: &HandlerError,
) {
    let code = error.code();
    if error.is_internal() {
        tracing::error!(
            session_id = %connection.session_id(),
            request,
            error = ?error,
            "Request failed"
        );
    } else {
        tracing::debug!(
            session_id = %connection.session_id(),
            request,
            code = code.as_str(),
            error = %error,
            "Request rejected"
        );
    }

    let response = ErrorResponse { code, request };
    if let Err(e) = connection.respond(EventType::ErrorResponse, seq, &response).await {
        tracing::debug!(session_id = %connection.session_id(), error = %e, "Failed to send error response");
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! A gateway over `MemoryStorage` and an index seeded the way a fresh
    //! install is.

    use std::time::Duration;

    use axum::extract::ws::Message;
    use futures_util::StreamExt;
    use huddle_common::{BootstrapConfig, GatewayConfig};
    use huddle_core::SnowflakeGenerator;
    use huddle_db::MemoryStorage;
    use huddle_service::bootstrap::bootstrap;
    use huddle_service::dto::{LoginRequest, RegisterRequest};
    use huddle_service::external::{AcceptAllCaptcha, DisabledEmbedFetcher, FsMediaStore};
    use huddle_service::services::AuthService;
    use huddle_service::Index;
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::connection::test_connection;

    pub(crate) const ADMIN_USERNAME: &str = "root";
    pub(crate) const ADMIN_PASSWORD: &str = "root password";

    pub(crate) struct TestGateway {
        pub state: GatewayState,
        _media: TempDir,
    }

    pub(crate) async fn test_gateway() -> TestGateway {
        let media = tempfile::tempdir().unwrap();
        let ctx = ServiceContext::builder()
            .storage(Arc::new(MemoryStorage::new()))
            .index(Arc::new(Index::new()))
            .snowflakes(Arc::new(SnowflakeGenerator::new(1).unwrap()))
            .media(Arc::new(FsMediaStore::new(media.path())))
            .embeds(Arc::new(DisabledEmbedFetcher))
            .captcha(Arc::new(AcceptAllCaptcha))
            .shutdown(CancellationToken::new())
            .build()
            .unwrap();
        let seed = BootstrapConfig {
            admin_username: Some(ADMIN_USERNAME.to_string()),
            admin_password: Some(ADMIN_PASSWORD.to_string()),
        };
        bootstrap(&ctx, "Test", &seed).await.unwrap();
        ctx.index().populate(ctx.storage()).await.unwrap();

        let config = GatewayConfig {
            queue_capacity: 16,
            close_timeout: Duration::from_millis(100),
            upload_slot_ttl: Duration::from_secs(60),
        };
        TestGateway {
            state: GatewayState::new(ctx, config, 1024 * 1024),
            _media: media,
        }
    }

    /// A registered, logged-in user on its own registered connection
    pub(crate) struct TestClient {
        pub conn: Arc<Connection>,
        pub queue: mpsc::Receiver<String>,
        pub socket: futures::channel::mpsc::UnboundedReceiver<Message>,
        pub user_id: Snowflake,
    }

    pub(crate) async fn connect_user(state: &GatewayState, username: &str) -> TestClient {
        let (user, token) = AuthService::new(state.service_context())
            .register(RegisterRequest {
                username: username.to_string(),
                password: "correct horse".to_string(),
                email: String::new(),
                invite_code: String::new(),
                captcha_response: String::new(),
            })
            .await
            .unwrap();

        let (conn, queue, socket) = test_connection(64);
        state.registry().add(Arc::clone(&conn));
        SessionHandler::authenticate(state, &conn, user.id, token).unwrap();
        TestClient {
            conn,
            queue,
            socket,
            user_id: user.id,
        }
    }

    /// The seeded administrator, logged in on a fresh connection
    pub(crate) async fn connect_admin(state: &GatewayState) -> TestClient {
        let (user_id, token) = AuthService::new(state.service_context())
            .login(LoginRequest {
                username: ADMIN_USERNAME.to_string(),
                password: ADMIN_PASSWORD.to_string(),
                captcha_response: String::new(),
            })
            .await
            .unwrap();

        let (conn, queue, socket) = test_connection(64);
        state.registry().add(Arc::clone(&conn));
        SessionHandler::authenticate(state, &conn, user_id, token).unwrap();
        TestClient {
            conn,
            queue,
            socket,
            user_id,
        }
    }

    /// The seeded "general" channel
    pub(crate) fn channel_id(state: &GatewayState) -> Snowflake {
        state.service_context().index().channels()[0].id
    }

    /// Next direct response written to the socket
    pub(crate) async fn next_reply(
        socket: &mut futures::channel::mpsc::UnboundedReceiver<Message>,
    ) -> serde_json::Value {
        let next = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .unwrap();
        match next {
            Some(Message::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    /// Next queued broadcast of type `kind`, skipping the others
    pub(crate) async fn next_event(queue: &mut mpsc::Receiver<String>, kind: u16) -> serde_json::Value {
        loop {
            let text = tokio::time::timeout(Duration::from_secs(2), queue.recv())
                .await
                .unwrap()
                .unwrap();
            let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
            if frame["type"] == kind {
                return frame;
            }
        }
    }

    /// Whether a broadcast of type `kind` is queued within a short wait
    pub(crate) async fn has_event(queue: &mut mpsc::Receiver<String>, kind: u16) -> bool {
        tokio::time::timeout(Duration::from_millis(200), next_event(queue, kind))
            .await
            .is_ok()
    }
}
