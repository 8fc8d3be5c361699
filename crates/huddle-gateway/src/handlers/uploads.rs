//! Completion of requests parked on an upload slot
//!
//! The originating connection may have gone away while the client was
//! uploading. The durable write and the broadcast happen regardless; only
//! the direct acknowledgement is skipped.

use std::sync::Arc;

use huddle_service::services::{MessageService, ServiceError, UploadedFile, UserService};

use super::{report_error, HandlerError, HandlerResult, MessageHandler, UserHandler};
use crate::connection::{Connection, PendingRequest, PendingUpload};
use crate::server::GatewayState;

pub struct UploadHandler;

impl UploadHandler {
    /// Apply the uploaded files to the parked request and finalize it.
    /// Failures are also reported to the originating connection.
    pub async fn complete(
        state: &GatewayState,
        request: PendingRequest,
        files: Vec<UploadedFile>,
    ) -> HandlerResult<()> {
        let connection = state.registry().get(request.session_id);
        let kind = request.kind();
        let seq = request.seq;

        let result = Self::apply(
            state,
            connection.as_ref(),
            seq.as_deref(),
            request.upload,
            &files,
        )
        .await;
        if let (Err(e), Some(connection)) = (&result, &connection) {
            report_error(connection, kind.as_u16(), seq.as_deref(), e).await;
        }
        result
    }

    /// Drop a parked request whose upload could not be read and tell the
    /// originating connection, when it is still open.
    pub async fn abandon(state: &GatewayState, request: PendingRequest, reason: String) {
        let Some(connection) = state.registry().get(request.session_id) else {
            return;
        };
        let error = HandlerError::Service(ServiceError::invalid_request(reason));
        report_error(
            &connection,
            request.kind().as_u16(),
            request.seq.as_deref(),
            &error,
        )
        .await;
    }

    async fn apply(
        state: &GatewayState,
        connection: Option<&Arc<Connection>>,
        seq: Option<&str>,
        upload: PendingUpload,
        files: &[UploadedFile],
    ) -> HandlerResult<()> {
        match upload {
            PendingUpload::MessageSend(mut message) => {
                MessageService::new(state.service_context())
                    .attach(&mut message, files)
                    .await?;
                MessageHandler::finalize(state, connection, seq, message).await
            }
            PendingUpload::UserUpdate(mut prepared) => {
                let avatar = files
                    .first()
                    .ok_or_else(|| ServiceError::invalid_request("avatar file missing"))?;
                UserService::new(state.service_context())
                    .attach_avatar(&mut prepared, &avatar.data)
                    .await?;
                UserHandler::finalize(state, prepared).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{
        channel_id, connect_user, next_event, next_reply, test_gateway, TestClient,
    };
    use crate::handlers::{RequestDispatcher, SessionHandler};
    use huddle_core::{ErrorCode, Snowflake};
    use serde_json::json;

    fn png() -> Vec<u8> {
        let mut bytes = Vec::new();
        let image = image::RgbaImage::from_pixel(4, 4, image::Rgba([200, 10, 10, 255]));
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    async fn reserve(
        state: &GatewayState,
        client: &mut TestClient,
        frame: serde_json::Value,
    ) -> Snowflake {
        RequestDispatcher::handle_frame(state, &client.conn, &frame.to_string()).await;
        let slot = next_reply(&mut client.socket).await;
        assert_eq!(slot["type"], 35);
        serde_json::from_value(slot["data"]["slot"].clone()).unwrap()
    }

    #[tokio::test]
    async fn test_message_upload_completes_send() {
        let gw = test_gateway().await;
        let mut alice = connect_user(&gw.state, "alice").await;
        let channel = channel_id(&gw.state);
        let frame = json!({
            "type": 9,
            "seq": "up",
            "data": {"channel": channel, "content": "look", "attachmentCount": 1}
        });
        let slot = reserve(&gw.state, &mut alice, frame).await;

        let pending = gw.state.registry().pending().pop(slot).unwrap();
        let files = vec![UploadedFile {
            filename: "notes.txt".into(),
            data: b"hello".to_vec(),
        }];
        UploadHandler::complete(&gw.state, pending, files).await.unwrap();

        let ack = next_reply(&mut alice.socket).await;
        assert_eq!(ack["type"], 10);
        assert_eq!(ack["seq"], "up");
        let added = next_event(&mut alice.queue, 11).await;
        assert_eq!(added["data"]["message"]["attachments"][0]["filename"], "notes.txt");
    }

    #[tokio::test]
    async fn test_upload_after_disconnect_still_relays() {
        let gw = test_gateway().await;
        let mut bob = connect_user(&gw.state, "bob").await;
        let mut watcher = connect_user(&gw.state, "watcher").await;
        let channel = channel_id(&gw.state);
        let frame = json!({
            "type": 9,
            "seq": "up",
            "data": {"channel": channel, "content": "bye", "attachmentCount": 1}
        });
        let slot = reserve(&gw.state, &mut bob, frame).await;
        SessionHandler::disconnect(&gw.state, &bob.conn);

        let pending = gw.state.registry().pending().pop(slot).unwrap();
        let files = vec![UploadedFile {
            filename: "a.txt".into(),
            data: b"x".to_vec(),
        }];
        UploadHandler::complete(&gw.state, pending, files).await.unwrap();

        let added = next_event(&mut watcher.queue, 11).await;
        assert_eq!(added["data"]["message"]["content"], "bye");
    }

    #[tokio::test]
    async fn test_avatar_upload_updates_profile() {
        let gw = test_gateway().await;
        let mut carol = connect_user(&gw.state, "carol").await;
        let frame = json!({
            "type": 42,
            "seq": "av",
            "data": {"user": carol.user_id, "setAvatar": true, "avatarModified": 1}
        });
        let slot = reserve(&gw.state, &mut carol, frame).await;

        let pending = gw.state.registry().pending().pop(slot).unwrap();
        let files = vec![UploadedFile {
            filename: "me.png".into(),
            data: png(),
        }];
        UploadHandler::complete(&gw.state, pending, files).await.unwrap();

        let updated = next_event(&mut carol.queue, 28).await;
        assert!(updated["data"]["user"]["avatarModified"].as_i64().unwrap() > 1);
    }

    #[tokio::test]
    async fn test_missing_avatar_reported() {
        let gw = test_gateway().await;
        let mut dave = connect_user(&gw.state, "dave").await;
        let frame = json!({
            "type": 42,
            "seq": "av",
            "data": {"user": dave.user_id, "setAvatar": true, "avatarModified": 1}
        });
        let slot = reserve(&gw.state, &mut dave, frame).await;

        let pending = gw.state.registry().pending().pop(slot).unwrap();
        let error = UploadHandler::complete(&gw.state, pending, Vec::new())
            .await
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidRequest);

        let reply = next_reply(&mut dave.socket).await;
        assert_eq!(reply["type"], 0);
        assert_eq!(reply["seq"], "av");
        assert_eq!(reply["data"]["request"], 42);
    }
}
