//! Channel entity and permission overwrites

use serde::{Deserialize, Serialize};

use super::UnknownVariant;
use crate::value_objects::{Permissions, Snowflake};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum ChannelKind {
    #[default]
    Text = 0,
    Voice = 1,
    Category = 2,
}

impl From<ChannelKind> for u8 {
    fn from(kind: ChannelKind) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for ChannelKind {
    type Error = UnknownVariant;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Text),
            1 => Ok(Self::Voice),
            2 => Ok(Self::Category),
            _ => Err(UnknownVariant {
                kind: "channel type",
                value: i64::from(value),
            }),
        }
    }
}

/// Whether an overwrite targets a role or a single user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum OverwriteKind {
    #[default]
    Role = 0,
    User = 1,
}

impl From<OverwriteKind> for u8 {
    fn from(kind: OverwriteKind) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for OverwriteKind {
    type Error = UnknownVariant;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Role),
            1 => Ok(Self::User),
            _ => Err(UnknownVariant {
                kind: "overwrite type",
                value: i64::from(value),
            }),
        }
    }
}

/// Per-channel allow/deny delta for one role or one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overwrite {
    /// Role id or user id depending on `kind`
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: OverwriteKind,
    #[serde(default)]
    pub allow: Permissions,
    #[serde(default)]
    pub deny: Permissions,
}

impl Overwrite {
    pub fn role(role_id: Snowflake, allow: Permissions, deny: Permissions) -> Self {
        Self {
            id: role_id,
            kind: OverwriteKind::Role,
            allow,
            deny,
        }
    }

    pub fn user(user_id: Snowflake, allow: Permissions, deny: Permissions) -> Self {
        Self {
            id: user_id,
            kind: OverwriteKind::User,
            allow,
            deny,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: Snowflake,
    #[serde(rename = "type", default)]
    pub kind: ChannelKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overwrites: Vec<Overwrite>,
}

impl Channel {
    pub fn text(id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            kind: ChannelKind::Text,
            name: name.into(),
            description: String::new(),
            position: 0,
            parent: None,
            overwrites: Vec::new(),
        }
    }
}
