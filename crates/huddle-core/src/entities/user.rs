//! User entity and presence

use serde::{Deserialize, Serialize};

use super::UnknownVariant;
use crate::value_objects::Snowflake;

/// Profile colour meaning "use the client's default".
pub const PROFILE_COLOR_DEFAULT: i32 = -1;

/// Avatar revision meaning "no uploaded avatar".
pub const AVATAR_DEFAULT: i64 = 0;

/// Connection presence as shown in the member list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Presence {
    #[default]
    Offline = 0,
    Online = 1,
    Away = 2,
}

impl Presence {
    /// Away users still count as online for list grouping.
    #[inline]
    pub fn is_online(self) -> bool {
        !matches!(self, Presence::Offline)
    }
}

impl From<Presence> for u8 {
    fn from(p: Presence) -> Self {
        p as u8
    }
}

impl TryFrom<u8> for Presence {
    type Error = UnknownVariant;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Offline),
            1 => Ok(Self::Online),
            2 => Ok(Self::Away),
            _ => Err(UnknownVariant {
                kind: "presence",
                value: i64::from(value),
            }),
        }
    }
}

/// A registered account.
///
/// `roles` is an unordered set of role ids; order carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile_message: String,
    #[serde(default = "default_profile_color")]
    pub profile_color: i32,
    #[serde(default)]
    pub avatar_modified: i64,
    #[serde(default)]
    pub presence: Presence,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Snowflake>,
}

fn default_profile_color() -> i32 {
    PROFILE_COLOR_DEFAULT
}

impl User {
    /// A fresh account with no roles; the display name is the username with
    /// its first letter upper-cased.
    pub fn new(id: Snowflake, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id,
            display_name: title_case(&username),
            username,
            status_message: String::new(),
            profile_message: String::new(),
            profile_color: PROFILE_COLOR_DEFAULT,
            avatar_modified: AVATAR_DEFAULT,
            presence: Presence::Offline,
            roles: Vec::new(),
        }
    }

    #[inline]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.contains(&role_id)
    }

    /// Member list ordering: display name, then id.
    #[inline]
    pub fn sort_key(&self) -> (&str, Snowflake) {
        (self.display_name.as_str(), self.id)
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = User::new(Snowflake::new(5), "alice");
        assert_eq!(user.display_name, "Alice");
        assert_eq!(user.profile_color, PROFILE_COLOR_DEFAULT);
        assert_eq!(user.avatar_modified, AVATAR_DEFAULT);
        assert_eq!(user.presence, Presence::Offline);
        assert!(user.roles.is_empty());
    }

    #[test]
    fn test_presence_grouping() {
        assert!(Presence::Online.is_online());
        assert!(Presence::Away.is_online());
        assert!(!Presence::Offline.is_online());
    }

    #[test]
    fn test_user_json_shape() {
        let mut user = User::new(Snowflake::new(9), "bob");
        user.presence = Presence::Online;
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], "9");
        assert_eq!(json["displayName"], "Bob");
        assert_eq!(json["presence"], 1);
        assert!(json.get("roles").is_none());
        assert!(json.get("statusMessage").is_none());
    }

    #[test]
    fn test_presence_rejects_unknown() {
        assert!(serde_json::from_str::<Presence>("7").is_err());
    }
}
