//! Grouped, sorted member list and its flattened view

use std::cmp::Ordering;
use std::collections::HashMap;

use huddle_core::{Role, Snowflake, User};
use serde::Serialize;

use super::range::IndexRange;
use super::UserInfo;

/// Group key of users without a hoisted role who are offline
pub const OFFLINE_GROUP: Snowflake = Snowflake::new(0);
/// Group key of users without a hoisted role who are online or away
pub const ONLINE_GROUP: Snowflake = Snowflake::new(1);

/// Whether `id` is one of the two presence group keys
pub fn is_presence_group(id: Snowflake) -> bool {
    id == ONLINE_GROUP || id == OFFLINE_GROUP
}

/// Which list group a user is shown in. A hoisted role wins over presence.
/// A role whose id collides with a presence group key never forms a group.
pub fn group_of(user: &User, info: &UserInfo) -> Snowflake {
    if !is_presence_group(info.hoist) {
        info.hoist
    } else if user.presence.is_online() {
        ONLINE_GROUP
    } else {
        OFFLINE_GROUP
    }
}

fn compare_members(users: &HashMap<Snowflake, User>, a: Snowflake, b: Snowflake) -> Ordering {
    match (users.get(&a), users.get(&b)) {
        (Some(a), Some(b)) => a.sort_key().cmp(&b.sort_key()),
        _ => a.cmp(&b),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserList {
    /// Hoisted roles by (position, id), then online, then offline
    pub group_order: Vec<Snowflake>,
    pub groups: HashMap<Snowflake, Vec<Snowflake>>,
    /// Marker of every non-empty group followed by its members
    pub view: Vec<Snowflake>,
}

impl UserList {
    /// Group and sort every user from scratch.
    pub fn build(
        users: &HashMap<Snowflake, User>,
        infos: &HashMap<Snowflake, UserInfo>,
        roles: &HashMap<Snowflake, Role>,
    ) -> Self {
        let mut hoisted: Vec<&Role> = roles
            .values()
            .filter(|r| r.hoisted && !is_presence_group(r.id))
            .collect();
        hoisted.sort_by_key(|r| r.order_key());

        let mut group_order: Vec<Snowflake> = hoisted.iter().map(|r| r.id).collect();
        group_order.push(ONLINE_GROUP);
        group_order.push(OFFLINE_GROUP);

        let mut groups: HashMap<Snowflake, Vec<Snowflake>> =
            group_order.iter().map(|id| (*id, Vec::new())).collect();

        for (id, user) in users {
            let info = infos.get(id).copied().unwrap_or_default();
            let mut group = group_of(user, &info);
            if !groups.contains_key(&group) {
                group = if user.presence.is_online() {
                    ONLINE_GROUP
                } else {
                    OFFLINE_GROUP
                };
            }
            groups.entry(group).or_default().push(*id);
        }

        for members in groups.values_mut() {
            members.sort_by(|a, b| compare_members(users, *a, *b));
        }

        let mut list = Self {
            group_order,
            groups,
            view: Vec::new(),
        };
        list.view = list.flatten();
        list
    }

    fn flatten(&self) -> Vec<Snowflake> {
        let members: usize = self.groups.values().map(Vec::len).sum();
        let mut view = Vec::with_capacity(members + self.group_order.len());
        for gid in &self.group_order {
            if let Some(members) = self.groups.get(gid).filter(|m| !m.is_empty()) {
                view.push(*gid);
                view.extend_from_slice(members);
            }
        }
        view
    }

    pub fn position(&self, id: Snowflake) -> Option<usize> {
        self.view.iter().position(|v| *v == id)
    }

    fn group_containing(&self, id: Snowflake) -> Option<(Snowflake, usize)> {
        self.groups.iter().find_map(|(gid, members)| {
            members.iter().position(|m| *m == id).map(|pos| (*gid, pos))
        })
    }

    /// Move one user into `group` at its sorted position and re-flatten.
    ///
    /// `users` must already hold the user's new display name. Returns the
    /// span between the old and new view positions, or `None` when the user
    /// is not listed or the group is unknown and a full rebuild is needed.
    pub fn reposition(
        &mut self,
        id: Snowflake,
        group: Snowflake,
        users: &HashMap<Snowflake, User>,
    ) -> Option<IndexRange> {
        if !self.groups.contains_key(&group) {
            return None;
        }
        let (old_group, old_pos) = self.group_containing(id)?;
        let old_view_pos = self.position(id)?;
        let old_marker = self.position(old_group);
        let old_len = self.view.len();

        if let Some(members) = self.groups.get_mut(&old_group) {
            members.remove(old_pos);
        }
        let members = self.groups.get_mut(&group)?;
        let insert_at = members
            .partition_point(|other| compare_members(users, *other, id) == Ordering::Less);
        members.insert(insert_at, id);

        self.view = self.flatten();
        let new_view_pos = self.position(id)?;

        let mut range = IndexRange::new(
            old_view_pos.min(new_view_pos),
            old_view_pos.max(new_view_pos) + 1,
        );
        // A group marker appeared or vanished, shifting the whole tail
        if self.view.len() != old_len {
            let new_marker = self.position(group);
            let markers = old_marker.into_iter().chain(new_marker);
            range.from = markers.fold(range.from, usize::min);
            range.to = range.to.max(old_len.max(self.view.len()));
        }
        Some(range)
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserListGroup {
    pub id: Snowflake,
    pub count: usize,
}

/// One window of the flattened view plus the size of every group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserListSlice {
    pub start: usize,
    pub end: usize,
    /// View entries in `[start, end)`; group markers included
    pub users: Vec<Snowflake>,
    pub groups: Vec<UserListGroup>,
}

impl UserList {
    /// Clamp `[start, end)` to the view, cap it at `limit` entries when
    /// `limit > 0`, and copy it out.
    pub fn slice(&self, start: usize, end: usize, limit: usize) -> UserListSlice {
        let total = self.view.len();
        let start = start.min(total);
        let mut end = end.clamp(start, total);
        if limit > 0 && end - start > limit {
            end = start + limit;
        }

        UserListSlice {
            start,
            end,
            users: self.view[start..end].to_vec(),
            groups: self
                .group_order
                .iter()
                .map(|gid| UserListGroup {
                    id: *gid,
                    count: self.groups.get(gid).map_or(0, Vec::len),
                })
                .collect(),
        }
    }
}
