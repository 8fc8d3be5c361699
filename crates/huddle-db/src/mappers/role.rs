//! Role entity <-> model mapper

use huddle_core::{Permissions, Role, Snowflake};

use crate::models::RoleModel;

impl From<RoleModel> for Role {
    fn from(model: RoleModel) -> Self {
        Role {
            id: Snowflake::new(model.id),
            name: model.name,
            color: model.color,
            position: model.position,
            permissions: Permissions::from_i64(model.permissions),
            hoisted: model.hoisted,
            mentionable: model.mentionable,
        }
    }
}
