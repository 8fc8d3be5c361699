//! Gateway registry
//!
//! Owns the live connection table, the user → sessions mapping used for
//! presence, and the pending upload table. Broadcast helpers live in
//! [`relay`].

mod relay;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use huddle_core::{Presence, Snowflake, User};
use huddle_service::Index;
use uuid::Uuid;

use crate::connection::{Connection, PendingUploads};

pub struct Registry {
    /// Live connections by session id
    connections: DashMap<Uuid, Arc<Connection>>,

    /// Authenticated sessions per user
    user_sessions: DashMap<Snowflake, HashSet<Uuid>>,

    pending: PendingUploads,

    index: Arc<Index>,
}

impl Registry {
    pub fn new(index: Arc<Index>, slot_ttl: Duration) -> Self {
        Self {
            connections: DashMap::new(),
            user_sessions: DashMap::new(),
            pending: PendingUploads::new(slot_ttl),
            index,
        }
    }

    pub fn new_shared(index: Arc<Index>, slot_ttl: Duration) -> Arc<Self> {
        Arc::new(Self::new(index, slot_ttl))
    }

    pub fn pending(&self) -> &PendingUploads {
        &self.pending
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn add(&self, connection: Arc<Connection>) {
        let session_id = connection.session_id();
        self.connections.insert(session_id, connection);
        tracing::debug!(session_id = %session_id, "Connection added");
    }

    pub fn get(&self, session_id: Uuid) -> Option<Arc<Connection>> {
        self.connections.get(&session_id).map(|c| Arc::clone(c.value()))
    }

    /// Record an authenticated session. The user's first session brings
    /// them online; returns the changed user when presence moved.
    ///
    /// Presence is applied and announced while the user's session set is
    /// locked, so a concurrent [`remove`](Self::remove) of their last
    /// session is ordered entirely before or after this.
    pub fn bind_user(&self, session_id: Uuid, user_id: Snowflake) -> Option<User> {
        let mut sessions = self.user_sessions.entry(user_id).or_default();
        let first = sessions.is_empty();
        sessions.insert(session_id);
        if !first {
            return None;
        }
        let user = self.index.set_presence(user_id, Presence::Online)?;
        self.announce_presence(&user);
        Some(user)
    }

    /// Remove a connection. When it was its user's last session the user
    /// goes offline under the session set lock; returns the changed user.
    pub fn remove(&self, session_id: Uuid) -> Option<User> {
        let (_, connection) = self.connections.remove(&session_id)?;
        tracing::debug!(session_id = %session_id, "Connection removed");

        let user_id = connection.user_id()?;
        let Entry::Occupied(mut entry) = self.user_sessions.entry(user_id) else {
            return None;
        };
        entry.get_mut().remove(&session_id);
        if !entry.get().is_empty() {
            return None;
        }

        let user = self.index.set_presence(user_id, Presence::Offline);
        if let Some(user) = &user {
            self.announce_presence(user);
        }
        entry.remove();
        user
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn session_count(&self, user_id: Snowflake) -> usize {
        self.user_sessions.get(&user_id).map_or(0, |s| s.len())
    }

    /// Snapshot of every authenticated connection, taken without holding
    /// shard locks afterwards.
    pub fn authenticated(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .filter(|c| c.is_authenticated())
            .map(|c| Arc::clone(c.value()))
            .collect()
    }

    /// Close every connection, each within `deadline`.
    pub async fn close_all(&self, deadline: Duration) {
        let connections: Vec<Arc<Connection>> =
            self.connections.iter().map(|c| Arc::clone(c.value())).collect();
        let closes = connections.iter().map(|c| c.close(deadline));
        futures::future::join_all(closes).await;
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("connections", &self.connections.len())
            .field("users", &self.user_sessions.len())
            .field("pending", &self.pending)
            .finish()
    }
}
