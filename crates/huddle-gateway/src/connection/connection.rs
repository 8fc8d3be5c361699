//! Individual WebSocket connection
//!
//! A connection has two writers sharing one sink: direct responses written
//! by the read loop under the sink lock, and broadcasts pushed through a
//! bounded queue that a dedicated writer task drains.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{close_code, CloseFrame, Message};
use futures::Sink;
use futures_util::SinkExt;
use huddle_core::Snowflake;
use huddle_service::IndexRange;
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

use crate::protocol::{encode, EventType, ProtocolError};

/// Write half of a socket
pub type WsSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

/// Connection state. There is no way back from `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unauthenticated,
    Authenticated,
    Closing,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    #[error("connection is closing")]
    Closing,
}

#[derive(Debug, Clone)]
struct Session {
    user_id: Snowflake,
    token: String,
}

pub struct Connection {
    session_id: Uuid,
    state: RwLock<ConnectionState>,
    session: RwLock<Option<Session>>,
    sink: Mutex<WsSink>,
    queue: mpsc::Sender<String>,
    /// Last member-list window this connection asked for
    user_list_window: RwLock<Option<IndexRange>>,
    cancel: CancellationToken,
    dropped: AtomicU64,
    created_at: Instant,
}

impl Connection {
    /// Create a connection whose lifetime is bounded by `parent`.
    ///
    /// The returned receiver feeds [`Connection::run_writer`].
    pub fn new(
        session_id: Uuid,
        sink: WsSink,
        queue_capacity: usize,
        parent: &CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (queue, rx) = mpsc::channel(queue_capacity.max(1));
        let connection = Arc::new(Self {
            session_id,
            state: RwLock::new(ConnectionState::Unauthenticated),
            session: RwLock::new(None),
            sink: Mutex::new(sink),
            queue,
            user_list_window: RwLock::new(None),
            cancel: parent.child_token(),
            dropped: AtomicU64::new(0),
            created_at: Instant::now(),
        });
        (connection, rx)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == ConnectionState::Authenticated
    }

    pub fn is_closing(&self) -> bool {
        self.state() == ConnectionState::Closing
    }

    pub fn user_id(&self) -> Option<Snowflake> {
        self.session.read().as_ref().map(|s| s.user_id)
    }

    pub fn token(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.token.clone())
    }

    /// Move to `Authenticated`. Only valid from `Unauthenticated`.
    pub fn authenticate(&self, user_id: Snowflake, token: String) -> bool {
        let mut state = self.state.write();
        if *state != ConnectionState::Unauthenticated {
            return false;
        }
        *self.session.write() = Some(Session { user_id, token });
        *state = ConnectionState::Authenticated;
        true
    }

    pub fn set_user_list_window(&self, start: usize, end: usize) {
        *self.user_list_window.write() = Some(IndexRange::new(start, end));
    }

    pub fn user_list_window(&self) -> Option<IndexRange> {
        *self.user_list_window.read()
    }

    /// Events dropped because the broadcast queue was full
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Write a response to this connection's own request immediately.
    pub async fn respond<T: Serialize>(
        &self,
        kind: EventType,
        seq: Option<&str>,
        data: &T,
    ) -> Result<(), ConnectionError> {
        let text = encode(kind, seq, data)?;
        self.send_text(text).await
    }

    async fn send_text(&self, text: String) -> Result<(), ConnectionError> {
        if self.is_closing() {
            return Err(ConnectionError::Closing);
        }
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Offer an encoded broadcast without waiting. A full queue drops the
    /// event for this connection only.
    pub fn offer(&self, text: String) -> bool {
        if self.is_closing() {
            return false;
        }
        match self.queue.try_send(text) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    session_id = %self.session_id,
                    dropped,
                    "Broadcast queue full, dropping event"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Drain the broadcast queue into the socket until cancelled.
    pub async fn run_writer(self: Arc<Self>, mut rx: mpsc::Receiver<String>) {
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                next = rx.recv() => {
                    let Some(text) = next else { break };
                    if let Err(e) = self.send_text(text).await {
                        tracing::debug!(session_id = %self.session_id, error = %e, "Writer stopped");
                        self.cancel.cancel();
                        break;
                    }
                }
            }
        }
    }

    /// Enter `Closing`, stop both tasks and attempt a close handshake
    /// within `deadline`. Returns false if the connection was already closing.
    pub async fn close(&self, deadline: Duration) -> bool {
        {
            let mut state = self.state.write();
            if *state == ConnectionState::Closing {
                return false;
            }
            *state = ConnectionState::Closing;
        }
        self.cancel.cancel();

        let handshake = async {
            let mut sink = self.sink.lock().await;
            sink.send(Message::Close(Some(CloseFrame {
                code: close_code::NORMAL,
                reason: "".into(),
            })))
            .await?;
            sink.close().await
        };
        match tokio::time::timeout(deadline, handshake).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(session_id = %self.session_id, error = %e, "Close handshake failed");
            }
            Err(_) => {
                tracing::debug!(session_id = %self.session_id, "Close handshake timed out");
            }
        }
        true
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .field("user_id", &self.user_id())
            .field("created_at", &self.created_at)
            .finish()
    }
}
