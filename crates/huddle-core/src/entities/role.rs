//! Role entity

use serde::{Deserialize, Serialize};

use crate::value_objects::{Permissions, Snowflake};

/// A named permission set.
///
/// Lower `position` means higher precedence; positions need not be
/// contiguous, ties are broken by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub color: i32,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub hoisted: bool,
    #[serde(default)]
    pub mentionable: bool,
}

impl Role {
    pub fn new(id: Snowflake, name: impl Into<String>, position: i32) -> Self {
        Self {
            id,
            name: name.into(),
            color: 0,
            position,
            permissions: Permissions::empty(),
            hoisted: false,
            mentionable: false,
        }
    }

    /// Total order used wherever roles are listed.
    #[inline]
    pub fn order_key(&self) -> (i32, Snowflake) {
        (self.position, self.id)
    }

    /// Whether a change from `self` to `other` can move members between
    /// list groups or alter anyone's resolved permissions.
    pub fn affects_members(&self, other: &Role) -> bool {
        self.position != other.position
            || self.permissions != other.permissions
            || self.hoisted != other.hoisted
    }
}
