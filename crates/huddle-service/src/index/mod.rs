//! In-memory projection of users, roles and channels
//!
//! The [`Index`] answers permission questions without touching storage and
//! maintains the grouped member list that clients page through. Handlers keep
//! it in step with storage by calling the mutators after each commit.
//!
//! Reads take the shared lock. Mutators take the exclusive lock for the map
//! update only; a full list rebuild sorts under the shared lock and swaps the
//! result in under a short exclusive section.

mod range;
mod user_list;

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use huddle_core::{
    compute_effective_rank, resolve_channel_permissions, resolve_user_permissions, Channel,
    DomainError, OverwriteKind, Permissions, Presence, Role, Settings, Snowflake, Storage, User, NO_RANK,
};

pub use range::{diff_views, IndexRange};
pub use user_list::{
    group_of, is_presence_group, UserList, UserListGroup, UserListSlice, OFFLINE_GROUP,
    ONLINE_GROUP,
};

/// Pending change ranges kept before they collapse into one
pub const MAX_PENDING_CHANGES: usize = 256;

/// Derived, per-user authorization summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserInfo {
    /// Lowest position among the user's roles; [`NO_RANK`] without roles
    pub rank: i32,
    /// Best hoisted role, or zero
    pub hoist: Snowflake,
    pub permissions: Permissions,
}

impl Default for UserInfo {
    fn default() -> Self {
        Self {
            rank: NO_RANK,
            hoist: Snowflake::ZERO,
            permissions: Permissions::empty(),
        }
    }
}

/// Compute rank, hoist group and base permissions for one user.
pub fn compute_user_info(
    user: &User,
    settings: &Settings,
    roles: &HashMap<Snowflake, Role>,
) -> UserInfo {
    let hoist = user
        .roles
        .iter()
        .filter_map(|id| roles.get(id))
        .filter(|role| role.hoisted && !is_presence_group(role.id))
        .min_by_key(|role| role.order_key())
        .map_or(Snowflake::ZERO, |role| role.id);

    UserInfo {
        rank: compute_effective_rank(user, roles),
        hoist,
        permissions: resolve_user_permissions(user, settings.default_permissions, roles),
    }
}

#[derive(Debug, Default)]
struct IndexState {
    settings: Settings,
    users: HashMap<Snowflake, User>,
    infos: HashMap<Snowflake, UserInfo>,
    roles: HashMap<Snowflake, Role>,
    channels: HashMap<Snowflake, Channel>,
    list: UserList,
    changes: Vec<IndexRange>,
    /// Set by mutators that invalidate the list grouping
    stale: bool,
    /// Bumped on every mutation, used to detect races with a rebuild
    generation: u64,
}

impl IndexState {
    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn refresh_info(&mut self, id: Snowflake) {
        if let Some(user) = self.users.get(&id) {
            let info = compute_user_info(user, &self.settings, &self.roles);
            self.infos.insert(id, info);
        }
    }

    fn refresh_all_infos(&mut self) {
        let infos = self
            .users
            .values()
            .map(|user| (user.id, compute_user_info(user, &self.settings, &self.roles)))
            .collect();
        self.infos = infos;
    }

    fn push_changes(&mut self, ranges: impl IntoIterator<Item = IndexRange>) {
        self.changes.extend(ranges);
        if self.changes.len() > MAX_PENDING_CHANGES {
            let merged = self
                .changes
                .iter()
                .copied()
                .reduce(|a, b| a.union(&b));
            self.changes = merged.into_iter().collect();
        }
    }

    /// Move one user within the list, or mark the list stale when that is
    /// not possible.
    fn reposition(&mut self, id: Snowflake) -> bool {
        let (Some(user), Some(info)) = (self.users.get(&id), self.infos.get(&id)) else {
            return false;
        };
        let group = group_of(user, info);
        match self.list.reposition(id, group, &self.users) {
            Some(range) => {
                self.push_changes([range]);
                true
            }
            None => {
                self.stale = true;
                false
            }
        }
    }
}

/// Shared in-memory projection of authorization-relevant state.
#[derive(Debug, Default)]
pub struct Index {
    state: RwLock<IndexState>,
    /// Serializes full rebuilds
    rebuild: Mutex<()>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings, roles, channels and users in one read transaction and
    /// build the member list. Replaces any previous contents.
    #[instrument(skip_all)]
    pub async fn populate(&self, storage: &dyn Storage) -> Result<(), DomainError> {
        let started = Instant::now();
        let mut tx = storage.begin().await?;
        let settings = tx.settings().await?.unwrap_or_default();
        let roles = tx.roles().await?;
        let channels = tx.channels().await?;
        let users = tx.users().await?;
        tx.commit().await?;

        {
            let mut state = self.state.write();
            state.settings = settings;
            state.roles = roles.into_iter().map(|r| (r.id, r)).collect();
            state.channels = channels.into_iter().map(|c| (c.id, c)).collect();
            state.users = users
                .into_iter()
                .map(|mut u| {
                    u.presence = Presence::Offline;
                    (u.id, u)
                })
                .collect();
            state.refresh_all_infos();
            state.list = UserList::default();
            state.changes.clear();
            state.stale = true;
            state.touch();
        }
        self.rebuild_user_list();

        let state = self.state.read();
        info!(
            users = state.users.len(),
            roles = state.roles.len(),
            channels = state.channels.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Index populated"
        );
        Ok(())
    }

    /// Recompute the member list from scratch and record what moved.
    pub fn rebuild_user_list(&self) {
        let _serial = self.rebuild.lock();
        let started = Instant::now();

        loop {
            let (next, generation) = {
                let state = self.state.read();
                (
                    UserList::build(&state.users, &state.infos, &state.roles),
                    state.generation,
                )
            };

            let mut state = self.state.write();
            if state.generation != generation {
                // A mutation slipped in while sorting
                continue;
            }
            let changes = diff_views(&state.list.view, &next.view);
            state.list = next;
            state.stale = false;
            state.push_changes(changes);
            break;
        }

        debug!(elapsed_us = started.elapsed().as_micros(), "User list rebuilt");
    }

    fn rebuild_if_stale(&self) {
        if self.state.read().stale {
            self.rebuild_user_list();
        }
    }

    /// Move a single user to its current group and sort position.
    pub fn reposition_user(&self, id: Snowflake) {
        let repositioned = {
            let mut state = self.state.write();
            let done = state.reposition(id);
            state.touch();
            done
        };
        if !repositioned {
            self.rebuild_if_stale();
        }
    }

    /// Take every change range recorded since the last call.
    pub fn pop_all_changes(&self) -> Vec<IndexRange> {
        std::mem::take(&mut self.state.write().changes)
    }

    pub fn user_list_slice(&self, start: usize, end: usize, limit: usize) -> UserListSlice {
        self.state.read().list.slice(start, end, limit)
    }

    pub fn user_list_len(&self) -> usize {
        self.state.read().list.len()
    }

    /// Copy of the current member list
    pub fn user_list(&self) -> UserList {
        self.state.read().list.clone()
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn settings(&self) -> Settings {
        self.state.read().settings.clone()
    }

    /// Replace settings; default permissions feed every user's info.
    pub fn set_settings(&self, settings: Settings) {
        let mut state = self.state.write();
        state.settings = settings;
        state.refresh_all_infos();
        state.touch();
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub fn user(&self, id: Snowflake) -> Option<User> {
        self.state.read().users.get(&id).cloned()
    }

    /// Known users among `ids`, in the order given
    pub fn users(&self, ids: &[Snowflake]) -> Vec<User> {
        let state = self.state.read();
        ids.iter().filter_map(|id| state.users.get(id).cloned()).collect()
    }

    pub fn user_count(&self) -> usize {
        self.state.read().users.len()
    }

    pub fn user_info(&self, id: Snowflake) -> Option<UserInfo> {
        self.state.read().infos.get(&id).copied()
    }

    /// Insert a new user. Presence is kept as given.
    pub fn add_user(&self, user: User) -> User {
        {
            let mut state = self.state.write();
            let id = user.id;
            state.users.insert(id, user.clone());
            state.refresh_info(id);
            state.stale = true;
            state.touch();
        }
        self.rebuild_user_list();
        user
    }

    /// Replace a user's profile and roles. Presence stays with the index.
    pub fn update_user(&self, mut user: User) -> User {
        let repositioned = {
            let mut state = self.state.write();
            let id = user.id;
            if let Some(existing) = state.users.get(&id) {
                user.presence = existing.presence;
            }
            state.users.insert(id, user.clone());
            state.refresh_info(id);
            let done = state.reposition(id);
            state.touch();
            done
        };
        if !repositioned {
            self.rebuild_if_stale();
        }
        user
    }

    pub fn delete_user(&self, id: Snowflake) {
        {
            let mut state = self.state.write();
            state.users.remove(&id);
            state.infos.remove(&id);
            state.stale = true;
            state.touch();
        }
        self.rebuild_user_list();
    }

    /// Set presence, returning the updated user when it changed.
    pub fn set_presence(&self, id: Snowflake, presence: Presence) -> Option<User> {
        let (user, repositioned) = {
            let mut state = self.state.write();
            let user = state.users.get_mut(&id)?;
            if user.presence == presence {
                return None;
            }
            user.presence = presence;
            let user = user.clone();
            let done = state.reposition(id);
            state.touch();
            (user, done)
        };
        if !repositioned {
            self.rebuild_if_stale();
        }
        Some(user)
    }

    // ========================================================================
    // Roles
    // ========================================================================

    pub fn role(&self, id: Snowflake) -> Option<Role> {
        self.state.read().roles.get(&id).cloned()
    }

    /// Every role by (position, id)
    pub fn roles(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.state.read().roles.values().cloned().collect();
        roles.sort_by_key(Role::order_key);
        roles
    }

    pub fn add_role(&self, role: Role) {
        self.mutate_roles(|state| {
            state.roles.insert(role.id, role);
        });
    }

    pub fn update_role(&self, role: Role) {
        self.mutate_roles(|state| {
            state.roles.insert(role.id, role);
        });
    }

    /// Remove a role and every assignment and channel overwrite naming it.
    pub fn delete_role(&self, id: Snowflake) {
        self.mutate_roles(|state| {
            state.roles.remove(&id);
            for user in state.users.values_mut() {
                user.roles.retain(|r| *r != id);
            }
            for channel in state.channels.values_mut() {
                channel
                    .overwrites
                    .retain(|o| !(o.kind == OverwriteKind::Role && o.id == id));
            }
        });
    }

    fn mutate_roles(&self, f: impl FnOnce(&mut IndexState)) {
        {
            let mut state = self.state.write();
            f(&mut state);
            state.refresh_all_infos();
            state.stale = true;
            state.touch();
        }
        self.rebuild_user_list();
    }

    // ========================================================================
    // Channels
    // ========================================================================

    pub fn channel(&self, id: Snowflake) -> Option<Channel> {
        self.state.read().channels.get(&id).cloned()
    }

    /// Every channel by (position, id)
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.state.read().channels.values().cloned().collect();
        channels.sort_by_key(|c| (c.position, c.id));
        channels
    }

    pub fn add_channel(&self, channel: Channel) {
        let mut state = self.state.write();
        state.channels.insert(channel.id, channel);
        state.touch();
    }

    pub fn update_channel(&self, channel: Channel) {
        self.add_channel(channel);
    }

    pub fn delete_channel(&self, id: Snowflake) {
        let mut state = self.state.write();
        state.channels.remove(&id);
        state.touch();
    }

    // ========================================================================
    // Permissions
    // ========================================================================

    /// Base permissions of a user; empty for unknown users.
    pub fn permissions(&self, user_id: Snowflake) -> Permissions {
        self.state
            .read()
            .infos
            .get(&user_id)
            .map_or(Permissions::empty(), |info| info.permissions)
    }

    /// Permissions of a user inside a channel. A zero channel id, or one the
    /// index does not know, yields the base permissions.
    pub fn channel_permissions(&self, user_id: Snowflake, channel_id: Snowflake) -> Permissions {
        let state = self.state.read();
        let (Some(user), Some(info)) = (state.users.get(&user_id), state.infos.get(&user_id))
        else {
            return Permissions::empty();
        };
        let channel = channel_id.non_zero().and_then(|id| state.channels.get(&id));
        if channel_id.non_zero().is_some() && channel.is_none() {
            warn!(channel_id = %channel_id, "Permission check against unknown channel");
        }
        resolve_channel_permissions(info.permissions, user, channel)
    }

    /// Effective rank of a user; [`NO_RANK`] for unknown users.
    pub fn rank(&self, user_id: Snowflake) -> i32 {
        self.state
            .read()
            .infos
            .get(&user_id)
            .map_or(NO_RANK, |info| info.rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::{Overwrite, Transaction};
    use huddle_db::MemoryStorage;
    use std::collections::HashSet;

    fn role(id: i64, position: i32, hoisted: bool, permissions: Permissions) -> Role {
        let mut role = Role::new(Snowflake::new(id), format!("role{id}"), position);
        role.hoisted = hoisted;
        role.permissions = permissions;
        role
    }

    fn user(id: i64, name: &str, roles: &[i64]) -> User {
        let mut user = User::new(Snowflake::new(id), name);
        user.roles = roles.iter().map(|r| Snowflake::new(*r)).collect();
        user
    }

    /// Every user exactly once, plus one marker per non-empty group
    fn assert_view_complete(index: &Index) {
        let list = index.user_list();
        let non_empty = list.groups.values().filter(|m| !m.is_empty()).count();
        assert_eq!(list.view.len(), index.user_count() + non_empty);

        let state = index.state.read();
        let mut seen = HashSet::new();
        for id in &list.view {
            if state.users.contains_key(id) {
                assert!(seen.insert(*id), "duplicate {id}");
            }
        }
        assert_eq!(seen.len(), state.users.len());
    }

    #[test]
    fn test_compute_user_info() {
        let mut roles = HashMap::new();
        for r in [
            role(501, 5, true, Permissions::MANAGE_MESSAGES),
            role(502, 2, false, Permissions::KICK_MEMBERS),
            role(503, 3, true, Permissions::empty()),
        ] {
            roles.insert(r.id, r);
        }
        let u = user(10, "alice", &[501, 502, 503, 99]);
        let info = compute_user_info(&u, &Settings::default(), &roles);

        assert_eq!(info.rank, 2);
        assert_eq!(info.hoist, Snowflake::new(503));
        assert!(info.permissions.has(Permissions::MANAGE_MESSAGES));
        assert!(info.permissions.has(Permissions::KICK_MEMBERS));
        assert!(info.permissions.has(Permissions::SEND_MESSAGES));
    }

    #[test]
    fn test_no_roles_gets_defaults() {
        let info = compute_user_info(&user(1, "a", &[]), &Settings::default(), &HashMap::new());
        assert_eq!(info.permissions, Permissions::DEFAULT);
        assert_eq!(info.rank, NO_RANK);
        assert!(info.hoist.is_zero());
    }

    #[test]
    fn test_admin_role_grants_all() {
        let index = Index::new();
        index.add_role(role(501, 1, false, Permissions::ADMINISTRATOR));
        index.add_user(user(10, "root", &[501]));
        assert_eq!(index.permissions(Snowflake::new(10)), Permissions::ALL);
    }

    #[test]
    fn test_view_complete_after_mutations() {
        let index = Index::new();
        index.add_role(role(501, 1, true, Permissions::empty()));
        for (id, name) in [(10, "carol"), (11, "alice"), (12, "bob")] {
            index.add_user(user(id, name, &[]));
            assert_view_complete(&index);
        }
        index.update_user(user(11, "alice", &[501]));
        assert_view_complete(&index);
        index.set_presence(Snowflake::new(12), Presence::Online);
        assert_view_complete(&index);
        index.update_role(role(501, 1, false, Permissions::empty()));
        assert_view_complete(&index);
        index.delete_user(Snowflake::new(10));
        assert_view_complete(&index);
        index.delete_role(Snowflake::new(501));
        assert_view_complete(&index);
        assert!(index.user(Snowflake::new(11)).unwrap().roles.is_empty());
    }

    #[test]
    fn test_role_with_presence_group_id_keeps_view_complete() {
        let index = Index::new();
        index.add_role(role(1, 1, true, Permissions::empty()));
        index.add_user(user(10, "alice", &[1]));
        index.add_user(user(11, "bob", &[]));
        assert_view_complete(&index);
        assert!(index.user_info(Snowflake::new(10)).unwrap().hoist.is_zero());

        index.set_presence(Snowflake::new(10), Presence::Online);
        assert_view_complete(&index);
        let ids: Vec<i64> = index.user_list().view.iter().map(|s| s.into_inner()).collect();
        assert_eq!(ids, vec![1, 10, 0, 11]);
    }

    #[test]
    fn test_update_role_recomputes_infos() {
        let index = Index::new();
        index.add_role(role(501, 1, false, Permissions::empty()));
        index.add_user(user(10, "alice", &[501]));
        assert!(!index.permissions(Snowflake::new(10)).has(Permissions::MANAGE_ROLES));

        index.update_role(role(501, 1, true, Permissions::MANAGE_ROLES));
        let info = index.user_info(Snowflake::new(10)).unwrap();
        assert!(info.permissions.has(Permissions::MANAGE_ROLES));
        assert_eq!(info.hoist, Snowflake::new(501));
        assert_eq!(index.user_list().view[0], Snowflake::new(501));
    }

    #[test]
    fn test_set_presence_reports_single_range() {
        let index = Index::new();
        for (id, name) in [(10, "alice"), (11, "bob"), (12, "carol")] {
            index.add_user(user(id, name, &[]));
        }
        index.pop_all_changes();

        // view: [offline, alice, bob, carol]; bob's online marker lands at 0
        let updated = index.set_presence(Snowflake::new(11), Presence::Online).unwrap();
        assert_eq!(updated.presence, Presence::Online);
        let changes = index.pop_all_changes();
        assert_eq!(changes, vec![IndexRange::new(0, 5)]);
        let ids: Vec<i64> = index.user_list().view.iter().map(|s| s.into_inner()).collect();
        assert_eq!(ids, vec![1, 11, 0, 10, 12]);

        // no change, nothing recorded
        assert!(index.set_presence(Snowflake::new(11), Presence::Online).is_none());
        assert!(index.pop_all_changes().is_empty());
    }

    #[test]
    fn test_update_user_keeps_presence() {
        let index = Index::new();
        index.add_user(user(10, "alice", &[]));
        index.set_presence(Snowflake::new(10), Presence::Away);

        let mut renamed = user(10, "alice", &[]);
        renamed.display_name = "Ally".into();
        let stored = index.update_user(renamed);
        assert_eq!(stored.presence, Presence::Away);
        assert_eq!(index.user(Snowflake::new(10)).unwrap().display_name, "Ally");
    }

    #[test]
    fn test_changes_collapse_when_unbounded() {
        let index = Index::new();
        {
            let mut state = index.state.write();
            let ranges = (0..MAX_PENDING_CHANGES + 1).map(|i| IndexRange::new(i, i + 1));
            state.push_changes(ranges);
        }
        let changes = index.pop_all_changes();
        assert_eq!(changes, vec![IndexRange::new(0, MAX_PENDING_CHANGES + 1)]);
    }

    #[test]
    fn test_channel_permissions() {
        let index = Index::new();
        index.add_role(role(501, 1, false, Permissions::empty()));
        index.add_user(user(10, "alice", &[501]));
        let mut channel = Channel::text(Snowflake::new(100), "staff");
        channel.overwrites.push(Overwrite::role(
            Snowflake::new(501),
            Permissions::MANAGE_MESSAGES,
            Permissions::empty(),
        ));
        channel.overwrites.push(Overwrite::user(
            Snowflake::new(10),
            Permissions::empty(),
            Permissions::SEND_MESSAGES,
        ));
        index.add_channel(channel);

        let perms = index.channel_permissions(Snowflake::new(10), Snowflake::new(100));
        assert!(perms.has(Permissions::MANAGE_MESSAGES));
        assert!(!perms.has(Permissions::SEND_MESSAGES));

        let global = index.channel_permissions(Snowflake::new(10), Snowflake::ZERO);
        assert!(global.has(Permissions::SEND_MESSAGES));

        assert_eq!(
            index.channel_permissions(Snowflake::new(99), Snowflake::new(100)),
            Permissions::empty()
        );
    }

    #[test]
    fn test_delete_role_strips_overwrites() {
        let index = Index::new();
        index.add_role(role(501, 1, false, Permissions::empty()));
        let mut channel = Channel::text(Snowflake::new(100), "general");
        channel.overwrites.push(Overwrite::role(
            Snowflake::new(501),
            Permissions::empty(),
            Permissions::VIEW_CHANNEL,
        ));
        index.add_channel(channel);

        index.delete_role(Snowflake::new(501));
        assert!(index.channel(Snowflake::new(100)).unwrap().overwrites.is_empty());
    }

    #[tokio::test]
    async fn test_populate_from_storage() {
        let storage = MemoryStorage::new();
        let mut tx = storage.begin().await.unwrap();
        tx.set_settings(&Settings::new("Test")).await.unwrap();
        tx.add_role(&role(501, 0, true, Permissions::ADMINISTRATOR)).await.unwrap();
        tx.add_channel(&Channel::text(Snowflake::new(100), "general")).await.unwrap();
        for (id, name) in [(10, "alice"), (11, "bob")] {
            tx.create_account(&huddle_core::NewAccount {
                user: user(id, name, if id == 10 { &[501][..] } else { &[] }),
                password_hash: String::new(),
                email: None,
            })
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();

        let index = Index::new();
        index.populate(&storage).await.unwrap();

        assert_eq!(index.settings().site_name, "Test");
        assert_eq!(index.roles().len(), 1);
        assert_eq!(index.channels().len(), 1);
        assert_eq!(index.permissions(Snowflake::new(10)), Permissions::ALL);
        assert_view_complete(&index);
        let ids: Vec<i64> = index.user_list().view.iter().map(|s| s.into_inner()).collect();
        assert_eq!(ids, vec![501, 10, 0, 11]);

        // populate twice gives the same result
        index.populate(&storage).await.unwrap();
        assert_view_complete(&index);
    }
}
