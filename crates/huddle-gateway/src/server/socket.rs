//! WebSocket handler
//!
//! Clients present their token as the WebSocket subprotocol. The socket is
//! split into the read loop running here and the writer task draining the
//! broadcast queue.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::header::SEC_WEBSOCKET_PROTOCOL;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::StreamExt;
use uuid::Uuid;

use crate::connection::Connection;
use crate::handlers::{RequestDispatcher, SessionHandler};
use crate::server::GatewayState;

/// WebSocket gateway handler
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let token = subprotocol_token(&headers);
    let ws = match &token {
        Some(token) => ws.protocols([token.clone()]),
        None => ws,
    };
    ws.on_upgrade(move |socket| handle_socket(state, socket, token))
}

/// First offered subprotocol, which carries the session token
fn subprotocol_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}

async fn handle_socket(state: GatewayState, socket: WebSocket, token: Option<String>) {
    let session_id = Uuid::new_v4();
    let (sink, mut stream) = socket.split();
    let (connection, queue) = Connection::new(
        session_id,
        Box::pin(sink),
        state.config().queue_capacity,
        state.shutdown(),
    );
    state.registry().add(Arc::clone(&connection));
    tracing::info!(session_id = %session_id, "WebSocket connection established");

    tokio::spawn(Arc::clone(&connection).run_writer(queue));

    if let Err(e) = SessionHandler::introduce(&state, &connection, token.as_deref()).await {
        tracing::debug!(session_id = %session_id, error = %e, "Introduction failed");
    }

    loop {
        tokio::select! {
            () = connection.cancelled() => break,
            next = stream.next() => match next {
                Some(Ok(Message::Text(text))) => {
                    RequestDispatcher::handle_frame(&state, &connection, &text).await;
                }
                Some(Ok(Message::Binary(_))) => {
                    tracing::debug!(session_id = %session_id, "Binary frame ignored");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!(session_id = %session_id, "Client closed connection");
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!(session_id = %session_id, error = %e, "WebSocket error");
                    break;
                }
            },
        }
    }

    connection.close(state.config().close_timeout).await;
    SessionHandler::disconnect(&state, &connection);
    tracing::info!(
        session_id = %session_id,
        dropped_events = connection.dropped_events(),
        "WebSocket connection closed"
    );
}
