//! User entity <-> model mapper

use huddle_core::{Presence, Snowflake, User};

use crate::models::UserModel;

/// Presence is never stored; loaded users start offline
impl From<UserModel> for User {
    fn from(model: UserModel) -> Self {
        User {
            id: Snowflake::new(model.id),
            username: model.username,
            display_name: model.display_name,
            status_message: model.status_message,
            profile_message: model.profile_message,
            profile_color: model.profile_color,
            avatar_modified: model.avatar_modified,
            presence: Presence::Offline,
            roles: model.roles.into_iter().map(Snowflake::new).collect(),
        }
    }
}
