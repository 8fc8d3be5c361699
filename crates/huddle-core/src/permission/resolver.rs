use std::collections::HashMap;

use crate::entities::{Channel, OverwriteKind, Role, User};
use crate::value_objects::{Permissions, Snowflake};

/// Rank of a user holding no (valid) roles: worse than any real position.
pub const NO_RANK: i32 = i32::MAX;

/// Base permissions of `user`: the default mask OR every held role's mask.
///
/// Role ids with no matching role are skipped. A surviving administrator bit
/// collapses the result to [`Permissions::ALL`].
pub fn resolve_user_permissions(
    user: &User,
    default_permissions: Permissions,
    roles: &HashMap<Snowflake, Role>,
) -> Permissions {
    let union = user
        .roles
        .iter()
        .filter_map(|id| roles.get(id))
        .fold(default_permissions, |acc, role| acc | role.permissions);

    union.expand_admin()
}

/// Layer `channel`'s overwrites on top of `base`.
///
/// Role overwrites matching any of the user's roles accumulate their allow
/// and deny masks and are applied together as `allow & !deny`. Overwrites
/// naming the user accumulate the same way and are applied on top of that,
/// so a user-level allow restores a bit a role overwrite denied. The
/// administrator check happens after the final mask. `None` means no channel,
/// which leaves `base` untouched.
pub fn resolve_channel_permissions(
    base: Permissions,
    user: &User,
    channel: Option<&Channel>,
) -> Permissions {
    let Some(channel) = channel else {
        return base;
    };

    let mut role_allow = Permissions::empty();
    let mut role_deny = Permissions::empty();
    let mut user_allow = Permissions::empty();
    let mut user_deny = Permissions::empty();

    for overwrite in &channel.overwrites {
        match overwrite.kind {
            OverwriteKind::Role if user.has_role(overwrite.id) => {
                role_allow |= overwrite.allow;
                role_deny |= overwrite.deny;
            }
            OverwriteKind::User if overwrite.id == user.id => {
                user_allow |= overwrite.allow;
                user_deny |= overwrite.deny;
            }
            _ => {}
        }
    }

    let after_roles = (base | role_allow) & !role_deny;
    ((after_roles | user_allow) & !user_deny).expand_admin()
}

/// Lowest position among the user's roles, or [`NO_RANK`].
///
/// Lower is better. Dangling role ids are ignored.
pub fn compute_effective_rank(user: &User, roles: &HashMap<Snowflake, Role>) -> i32 {
    user.roles
        .iter()
        .filter_map(|id| roles.get(id))
        .map(|role| role.position)
        .min()
        .unwrap_or(NO_RANK)
}
