//! Stored media downloads

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use huddle_core::{DomainError, Snowflake, StoredMedia};

use crate::server::GatewayState;

pub async fn attachment_handler(
    State(state): State<GatewayState>,
    Path((attachment_id, filename)): Path<(Snowflake, String)>,
) -> Response {
    let loaded = state
        .service_context()
        .media()
        .load_attachment(attachment_id, &filename)
        .await;
    media_response(loaded)
}

pub async fn avatar_handler(
    State(state): State<GatewayState>,
    Path(user_id): Path<Snowflake>,
) -> Response {
    let loaded = state.service_context().media().load_avatar(user_id).await;
    media_response(loaded)
}

fn media_response(loaded: Result<Option<StoredMedia>, DomainError>) -> Response {
    match loaded {
        Ok(Some(media)) => ([(header::CONTENT_TYPE, media.mimetype)], media.data).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Loading media failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::{connect_user, test_gateway};
    use crate::server::create_app;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use huddle_core::{NewAttachment, Snowflake};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_attachment_download() {
        let gw = test_gateway().await;
        let stored = gw
            .state
            .service_context()
            .media()
            .store_attachment(NewAttachment {
                id: Snowflake::new(42),
                filename: "notes.txt",
                data: b"hello",
            })
            .await
            .unwrap();

        let app = create_app(gw.state.clone());
        let uri = format!("/attachments/{}/{}", stored.id, stored.filename);
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/plain");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_missing_avatar_is_not_found() {
        let gw = test_gateway().await;
        let alice = connect_user(&gw.state, "alice").await;

        let app = create_app(gw.state.clone());
        let response = app
            .oneshot(
                Request::get(format!("/avatars/{}", alice.user_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
