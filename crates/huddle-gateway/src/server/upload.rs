//! Upload correlation endpoint
//!
//! A client that was handed an upload slot over the socket posts its files
//! here. The slot is consumed before the body is read, so a second attempt
//! against the same slot is rejected whatever it carries.

use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use huddle_common::ErrorResponse;
use huddle_core::{ErrorCode, Snowflake};
use huddle_service::services::UploadedFile;
use serde::Deserialize;
use thiserror::Error;

use crate::connection::PendingUpload;
use crate::handlers::{HandlerError, UploadHandler};
use crate::server::GatewayState;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unknown upload slot")]
    UnknownSlot,

    #[error("malformed upload: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Finalize(#[from] HandlerError),
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(err.body_text())
    }
}

impl UploadError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownSlot => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Finalize(e) if e.code() == ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Finalize(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownSlot | Self::BadRequest(_) => ErrorCode::InvalidRequest,
            Self::Finalize(e) => e.code(),
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = ?self, "Upload finalize failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorResponse {
            code: self.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// Declaration preceding each attachment part. `size` and `spoilered`
/// may be present and are not used.
#[derive(Debug, Deserialize)]
struct FileMetadata {
    filename: String,
}

/// Complete the request parked on `slot_id`
pub async fn upload_handler(
    State(state): State<GatewayState>,
    Path(slot_id): Path<Snowflake>,
    multipart: Multipart,
) -> Result<&'static str, UploadError> {
    let pending = state
        .registry()
        .pending()
        .pop(slot_id)
        .ok_or(UploadError::UnknownSlot)?;

    let read = match &pending.upload {
        PendingUpload::MessageSend(_) => read_attachments(multipart).await,
        PendingUpload::UserUpdate(_) => read_first_file(multipart)
            .await
            .map(|file| file.into_iter().collect()),
    };
    let files = match read {
        Ok(files) => files,
        Err(e) => {
            UploadHandler::abandon(&state, pending, e.to_string()).await;
            return Err(e);
        }
    };
    tracing::debug!(slot = %slot_id, files = files.len(), "Upload received");

    UploadHandler::complete(&state, pending, files).await?;
    Ok("OK")
}

/// Read `metadata_N` / `file_N` pairs. A file without a preceding
/// metadata part, or a metadata part not followed by its file, is skipped.
async fn read_attachments(mut multipart: Multipart) -> Result<Vec<UploadedFile>, UploadError> {
    let mut files = Vec::new();
    let mut declared: Option<FileMetadata> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name.starts_with("metadata") {
            let text = field.text().await?;
            let metadata = serde_json::from_str(&text)
                .map_err(|e| UploadError::BadRequest(format!("invalid metadata: {e}")))?;
            declared = Some(metadata);
        } else if name.starts_with("file") {
            let data = field.bytes().await?;
            match declared.take() {
                Some(metadata) => files.push(UploadedFile {
                    filename: metadata.filename,
                    data: data.to_vec(),
                }),
                None => tracing::debug!(part = %name, "File part without metadata skipped"),
            }
        }
    }
    Ok(files)
}

async fn read_first_file(mut multipart: Multipart) -> Result<Option<UploadedFile>, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let data = field.bytes().await?;
        return Ok(Some(UploadedFile {
            filename,
            data: data.to_vec(),
        }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{
        channel_id, connect_user, next_event, next_reply, test_gateway,
    };
    use crate::handlers::RequestDispatcher;
    use crate::server::create_app;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    const BOUNDARY: &str = "huddle-boundary";

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let disposition = match filename {
                Some(filename) => format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                ),
                None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n"),
            };
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(slot: &str, body: Vec<u8>) -> Request<Body> {
        Request::post(format!("/upload/{slot}"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_slot_is_not_found() {
        let gw = test_gateway().await;
        let app = create_app(gw.state.clone());

        let body = multipart_body(&[("file_0", Some("a.txt"), &b"x"[..])]);
        let response = app.oneshot(upload_request("12345", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_completes_message_once() {
        let gw = test_gateway().await;
        let mut alice = connect_user(&gw.state, "alice").await;
        let channel = channel_id(&gw.state);
        let frame = json!({
            "type": 9,
            "seq": "s",
            "data": {"channel": channel, "content": "files", "attachmentCount": 2}
        });
        RequestDispatcher::handle_frame(&gw.state, &alice.conn, &frame.to_string()).await;
        let slot = next_reply(&mut alice.socket).await["data"]["slot"]
            .as_str()
            .unwrap()
            .to_string();

        let body = multipart_body(&[
            ("metadata_0", None, &br#"{"filename":"one.txt","size":3,"spoilered":false}"#[..]),
            ("file_0", Some("one.txt"), &b"one"[..]),
            ("file_1", Some("orphan.txt"), &b"skipped"[..]),
        ]);
        let app = create_app(gw.state.clone());
        let response = app.clone().oneshot(upload_request(&slot, body.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let ack = next_reply(&mut alice.socket).await;
        assert_eq!(ack["type"], 10);
        let added = next_event(&mut alice.queue, 11).await;
        let attachments = added["data"]["message"]["attachments"].as_array().unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0]["filename"], "one.txt");

        let again = app.oneshot(upload_request(&slot, body)).await.unwrap();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_metadata_is_bad_request() {
        let gw = test_gateway().await;
        let mut bob = connect_user(&gw.state, "bob").await;
        let channel = channel_id(&gw.state);
        let frame = json!({
            "type": 9,
            "seq": "s",
            "data": {"channel": channel, "content": "", "attachmentCount": 1}
        });
        RequestDispatcher::handle_frame(&gw.state, &bob.conn, &frame.to_string()).await;
        let slot = next_reply(&mut bob.socket).await["data"]["slot"]
            .as_str()
            .unwrap()
            .to_string();

        let body = multipart_body(&[("metadata_0", None, &b"not json"[..])]);
        let app = create_app(gw.state.clone());
        let response = app.oneshot(upload_request(&slot, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error = next_reply(&mut bob.socket).await;
        assert_eq!(error["type"], 0);
        assert_eq!(error["seq"], "s");
        assert_eq!(error["data"]["code"], ErrorCode::InvalidRequest as u8);
        assert_eq!(error["data"]["request"], 9);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(UploadError::UnknownSlot.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            UploadError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UploadError::Finalize(HandlerError::NotAuthenticated).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
