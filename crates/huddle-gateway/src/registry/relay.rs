//! Broadcast fan-out
//!
//! Events are encoded once and offered to each connection's bounded queue;
//! a full queue drops the event for that connection and never blocks the
//! sender.

use std::collections::HashSet;
use std::sync::Arc;

use huddle_core::{Channel, Permissions, Snowflake, User};
use huddle_service::dto::{ChannelDeleteEvent, ChannelEvent, UserPresenceEvent};
use huddle_service::services::user::USER_LIST_LIMIT;
use serde::Serialize;
use tokio::task::JoinHandle;

use super::Registry;
use crate::protocol::{encode, EventType};

impl Registry {
    fn encode_event<T: Serialize>(kind: EventType, data: &T) -> Option<String> {
        match encode(kind, None, data) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!(event = %kind, error = %e, "Failed to encode broadcast");
                None
            }
        }
    }

    /// Deliver to every authenticated connection. Returns how many accepted.
    pub fn relay<T: Serialize>(&self, kind: EventType, data: &T) -> usize {
        let Some(text) = Self::encode_event(kind, data) else {
            return 0;
        };
        self.authenticated()
            .iter()
            .filter(|conn| conn.offer(text.clone()))
            .count()
    }

    /// Deliver to every authenticated connection whose user can view
    /// `channel`. Runs on a detached task.
    pub fn relay_by_channel<T: Serialize>(
        self: &Arc<Self>,
        kind: EventType,
        data: &T,
        channel: Snowflake,
    ) -> Option<JoinHandle<usize>> {
        let text = Self::encode_event(kind, data)?;
        let registry = Arc::clone(self);
        Some(tokio::spawn(async move {
            registry.deliver_to_channel(&text, channel)
        }))
    }

    fn deliver_to_channel(&self, text: &str, channel: Snowflake) -> usize {
        self.authenticated()
            .iter()
            .filter(|conn| conn.user_id().is_some_and(|user_id| self.can_view(user_id, channel)))
            .filter(|conn| conn.offer(text.to_string()))
            .count()
    }

    fn can_view(&self, user_id: Snowflake, channel: Snowflake) -> bool {
        self.index()
            .channel_permissions(user_id, channel)
            .has(Permissions::VIEW_CHANNEL)
    }

    /// Users with a live connection who can view `channel` right now
    pub fn channel_viewers(&self, channel: Snowflake) -> HashSet<Snowflake> {
        self.authenticated()
            .iter()
            .filter_map(|conn| conn.user_id())
            .filter(|user_id| self.can_view(*user_id, channel))
            .collect()
    }

    /// Announce a changed channel against who could see it before the
    /// change: kept viewers get `ChannelUpdate`, new viewers `ChannelAdd`
    /// and those who lost view `ChannelDelete`.
    pub fn relay_channel_update(
        &self,
        channel: &Channel,
        viewers_before: &HashSet<Snowflake>,
    ) -> usize {
        let event = ChannelEvent {
            channel: channel.clone(),
        };
        let (Some(updated), Some(added), Some(deleted)) = (
            Self::encode_event(EventType::ChannelUpdate, &event),
            Self::encode_event(EventType::ChannelAdd, &event),
            Self::encode_event(
                EventType::ChannelDelete,
                &ChannelDeleteEvent {
                    channel: channel.id,
                },
            ),
        ) else {
            return 0;
        };

        let mut delivered = 0;
        for conn in self.authenticated() {
            let Some(user_id) = conn.user_id() else {
                continue;
            };
            let was_viewer = viewers_before.contains(&user_id);
            let text = match (was_viewer, self.can_view(user_id, channel.id)) {
                (true, true) => &updated,
                (false, true) => &added,
                (true, false) => &deleted,
                (false, false) => continue,
            };
            if conn.offer(text.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Tell everyone about a presence change and refresh affected lists.
    pub fn announce_presence(&self, user: &User) {
        self.relay(
            EventType::UserPresence,
            &UserPresenceEvent {
                user: user.id,
                presence: user.presence,
            },
        );
        self.fanout_user_list();
    }

    /// Drain the index's pending list changes and refresh every connection
    /// whose last requested window touches one of them.
    pub fn fanout_user_list(&self) -> usize {
        let changes = self.index().pop_all_changes();
        if changes.is_empty() {
            return 0;
        }

        let mut refreshed = 0;
        for conn in self.authenticated() {
            let Some(window) = conn.user_list_window() else {
                continue;
            };
            if !changes.iter().any(|change| change.touches(&window)) {
                continue;
            }
            let slice = self
                .index()
                .user_list_slice(window.from, window.to, USER_LIST_LIMIT);
            if let Some(text) = Self::encode_event(EventType::UserListResponse, &slice) {
                if conn.offer(text) {
                    refreshed += 1;
                }
            }
        }
        refreshed
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::connection::test_connection;
    use huddle_core::{Channel, Overwrite, Presence, Role, Settings, User};
    use huddle_service::Index;

    fn registry_with(index: Index) -> Arc<Registry> {
        Registry::new_shared(Arc::new(index), Duration::from_secs(60))
    }

    fn queued(rx: &mut tokio::sync::mpsc::Receiver<String>) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(text) = rx.try_recv() {
            frames.push(serde_json::from_str(&text).unwrap());
        }
        frames
    }

    #[tokio::test]
    async fn test_relay_skips_unauthenticated() {
        let registry = registry_with(Index::new());
        let (a, mut qa, _sa) = test_connection(4);
        let (b, mut qb, _sb) = test_connection(4);
        a.authenticate(Snowflake::new(1), "t".into());
        registry.add(Arc::clone(&a));
        registry.add(Arc::clone(&b));

        let delivered = registry.relay(EventType::RoleDelete, &serde_json::json!({"role": "3"}));
        assert_eq!(delivered, 1);
        assert_eq!(queued(&mut qa)[0]["type"], 25);
        assert!(queued(&mut qb).is_empty());
    }

    #[tokio::test]
    async fn test_channel_update_follows_visibility() {
        let index = Index::new();
        index.set_settings(Settings::new("Test"));
        for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
            index.add_user(User::new(Snowflake::new(id), name));
        }
        let mut channel = Channel::text(Snowflake::new(100), "lobby");
        channel.overwrites = vec![Overwrite::user(
            Snowflake::new(3),
            Permissions::empty(),
            Permissions::VIEW_CHANNEL,
        )];
        index.add_channel(channel.clone());

        let registry = registry_with(index);
        let mut queues = Vec::new();
        for id in 1..=3 {
            let (conn, queue, _socket) = test_connection(4);
            conn.authenticate(Snowflake::new(id), "t".into());
            registry.add(Arc::clone(&conn));
            queues.push(queue);
        }

        let before = registry.channel_viewers(channel.id);
        assert_eq!(before.len(), 2);

        // bob loses view, carol gains it
        channel.overwrites = vec![Overwrite::user(
            Snowflake::new(2),
            Permissions::empty(),
            Permissions::VIEW_CHANNEL,
        )];
        registry.index().update_channel(channel.clone());
        assert_eq!(registry.relay_channel_update(&channel, &before), 3);

        let kinds: Vec<u64> = queues
            .iter_mut()
            .map(|q| queued(q)[0]["type"].as_u64().unwrap())
            .collect();
        assert_eq!(kinds, vec![20, 21, 19]);
    }

    #[tokio::test]
    async fn test_relay_by_channel_checks_view_permission() {
        let index = Index::new();
        index.set_settings(Settings::new("Test"));
        let member = Role::new(Snowflake::new(50), "Member", 1);
        index.add_role(member.clone());

        let mut channel = Channel::text(Snowflake::new(100), "members-only");
        channel.overwrites = vec![Overwrite::role(
            member.id,
            Permissions::VIEW_CHANNEL,
            Permissions::empty(),
        )];
        index.add_channel(channel.clone());

        let mut alice = User::new(Snowflake::new(1), "alice");
        alice.roles = vec![member.id];
        index.add_user(alice.clone());
        index.add_user(User::new(Snowflake::new(2), "bob"));

        // Nobody sees the channel without the Member overwrite
        let mut settings = Settings::new("Test");
        settings.default_permissions = Permissions::DEFAULT - Permissions::VIEW_CHANNEL;
        index.set_settings(settings);

        let registry = registry_with(index);
        let (a, mut qa, _sa) = test_connection(4);
        let (b, mut qb, _sb) = test_connection(4);
        a.authenticate(Snowflake::new(1), "a".into());
        b.authenticate(Snowflake::new(2), "b".into());
        registry.add(Arc::clone(&a));
        registry.add(Arc::clone(&b));

        let handle = registry
            .relay_by_channel(EventType::MessageAdd, &serde_json::json!({"x": 1}), channel.id)
            .unwrap();
        assert_eq!(handle.await.unwrap(), 1);
        assert_eq!(queued(&mut qa).len(), 1);
        assert!(queued(&mut qb).is_empty());
    }

    #[tokio::test]
    async fn test_user_list_fanout_matches_windows() {
        let index = Index::new();
        index.set_settings(Settings::new("Test"));
        for id in 1..=5 {
            index.add_user(User::new(Snowflake::new(id), &format!("user{id}")));
        }
        let registry = registry_with(index);
        registry.index().pop_all_changes();

        let (watching, mut qw, _sw) = test_connection(4);
        let (idle, mut qi, _si) = test_connection(4);
        watching.authenticate(Snowflake::new(1), "w".into());
        idle.authenticate(Snowflake::new(2), "i".into());
        watching.set_user_list_window(0, 20);
        registry.add(Arc::clone(&watching));
        registry.add(Arc::clone(&idle));

        registry.index().set_presence(Snowflake::new(3), Presence::Online);
        assert_eq!(registry.fanout_user_list(), 1);

        let frames = queued(&mut qw);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], 8);
        assert!(queued(&mut qi).is_empty());

        // Changes were drained
        assert_eq!(registry.fanout_user_list(), 0);
    }
}
