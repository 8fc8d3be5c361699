//! Permission bits
//!
//! Stored as BIGINT in the database and sent to clients as a plain integer;
//! every defined bit fits in 31 bits, so the value is safe for JavaScript.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u64 {
        /// Implies every other permission
        const ADMINISTRATOR        = 1 << 0;
        /// Create invite codes
        const INVITE_MEMBERS       = 1 << 1;
        const SILENCE_MEMBERS      = 1 << 2;
        const KICK_MEMBERS         = 1 << 3;
        const BAN_MEMBERS          = 1 << 4;
        /// Post messages in a channel
        const SEND_MESSAGES        = 1 << 5;
        /// Add a new emoji reaction to a message
        const ADD_REACTIONS        = 1 << 6;
        /// Links in sent messages get previews
        const EMBED_LINKS          = 1 << 7;
        /// Attach files to sent messages
        const UPLOAD_FILES         = 1 << 8;
        const MENTION_EVERYONE     = 1 << 9;
        const CHANGE_NICKNAME      = 1 << 10;
        /// See a channel and receive its events
        const VIEW_CHANNEL         = 1 << 11;
        const READ_MESSAGE_HISTORY = 1 << 12;
        const MANAGE_NICKNAMES     = 1 << 13;
        /// Delete messages written by others
        const MANAGE_MESSAGES      = 1 << 14;
        const MANAGE_CHANNELS      = 1 << 15;
        /// Edit roles and assign them below one's own rank
        const MANAGE_ROLES         = 1 << 16;
        const MANAGE_EMOJIS        = 1 << 17;
        /// Edit one's own profile
        const CHANGE_PROFILE       = 1 << 18;
        /// Reset other users' profiles
        const MANAGE_PROFILES      = 1 << 19;

        /// Granted to every user regardless of roles unless settings override it
        const DEFAULT = Self::SEND_MESSAGES.bits()
            | Self::ADD_REACTIONS.bits()
            | Self::EMBED_LINKS.bits()
            | Self::UPLOAD_FILES.bits()
            | Self::CHANGE_NICKNAME.bits()
            | Self::VIEW_CHANNEL.bits()
            | Self::READ_MESSAGE_HISTORY.bits()
            | Self::CHANGE_PROFILE.bits();

        /// Result of any resolution that retains the administrator bit
        const ALL = 0x7FFF_FFFF;
    }
}

const NAMES: &[(Permissions, &str)] = &[
    (Permissions::ADMINISTRATOR, "ADMINISTRATOR"),
    (Permissions::INVITE_MEMBERS, "INVITE_MEMBERS"),
    (Permissions::SILENCE_MEMBERS, "SILENCE_MEMBERS"),
    (Permissions::KICK_MEMBERS, "KICK_MEMBERS"),
    (Permissions::BAN_MEMBERS, "BAN_MEMBERS"),
    (Permissions::SEND_MESSAGES, "SEND_MESSAGES"),
    (Permissions::ADD_REACTIONS, "ADD_REACTIONS"),
    (Permissions::EMBED_LINKS, "EMBED_LINKS"),
    (Permissions::UPLOAD_FILES, "UPLOAD_FILES"),
    (Permissions::MENTION_EVERYONE, "MENTION_EVERYONE"),
    (Permissions::CHANGE_NICKNAME, "CHANGE_NICKNAME"),
    (Permissions::VIEW_CHANNEL, "VIEW_CHANNEL"),
    (Permissions::READ_MESSAGE_HISTORY, "READ_MESSAGE_HISTORY"),
    (Permissions::MANAGE_NICKNAMES, "MANAGE_NICKNAMES"),
    (Permissions::MANAGE_MESSAGES, "MANAGE_MESSAGES"),
    (Permissions::MANAGE_CHANNELS, "MANAGE_CHANNELS"),
    (Permissions::MANAGE_ROLES, "MANAGE_ROLES"),
    (Permissions::MANAGE_EMOJIS, "MANAGE_EMOJIS"),
    (Permissions::CHANGE_PROFILE, "CHANGE_PROFILE"),
    (Permissions::MANAGE_PROFILES, "MANAGE_PROFILES"),
];

impl Permissions {
    /// Check for a permission. Resolved masks collapse to [`Permissions::ALL`]
    /// when the administrator bit survives, so this is a plain containment test.
    #[inline]
    pub fn has(&self, permission: Permissions) -> bool {
        self.contains(permission)
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.contains(Permissions::ADMINISTRATOR)
    }

    /// Collapse to [`Permissions::ALL`] when the administrator bit is present.
    #[inline]
    pub fn expand_admin(self) -> Self {
        if self.is_admin() {
            Permissions::ALL
        } else {
            self
        }
    }

    pub fn combine<I>(masks: I) -> Self
    where
        I: IntoIterator<Item = Permissions>,
    {
        masks.into_iter().fold(Permissions::empty(), |acc, p| acc | p)
    }

    #[inline]
    pub fn to_i64(self) -> i64 {
        self.bits() as i64
    }

    #[inline]
    pub fn from_i64(bits: i64) -> Self {
        Permissions::from_bits_truncate(bits as u64)
    }

    /// Names of the individual permissions that are set, for logs.
    pub fn list(&self) -> Vec<&'static str> {
        NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::empty()
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl Serialize for Permissions {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

// Accept both integers and decimal strings
impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct PermissionsVisitor;

        impl Visitor<'_> for PermissionsVisitor {
            type Value = Permissions;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an integer or string of permission bits")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Permissions, E>
            where
                E: de::Error,
            {
                Ok(Permissions::from_i64(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Permissions, E>
            where
                E: de::Error,
            {
                Ok(Permissions::from_bits_truncate(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Permissions, E>
            where
                E: de::Error,
            {
                value
                    .parse::<u64>()
                    .map(Permissions::from_bits_truncate)
                    .map_err(|_| de::Error::custom("invalid permissions string"))
            }
        }

        deserializer.deserialize_any(PermissionsVisitor)
    }
}

impl From<i64> for Permissions {
    fn from(bits: i64) -> Self {
        Permissions::from_i64(bits)
    }
}

impl From<Permissions> for i64 {
    fn from(perms: Permissions) -> Self {
        perms.to_i64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_positions() {
        assert_eq!(Permissions::ADMINISTRATOR.bits(), 1);
        assert_eq!(Permissions::SEND_MESSAGES.bits(), 1 << 5);
        assert_eq!(Permissions::UPLOAD_FILES.bits(), 1 << 8);
        assert_eq!(Permissions::VIEW_CHANNEL.bits(), 1 << 11);
        assert_eq!(Permissions::MANAGE_ROLES.bits(), 1 << 16);
        assert_eq!(Permissions::MANAGE_PROFILES.bits(), 1 << 19);
        assert_eq!(Permissions::ALL.bits(), 0x7FFF_FFFF);
    }

    #[test]
    fn test_default_permissions() {
        let default = Permissions::DEFAULT;
        assert!(default.has(Permissions::SEND_MESSAGES));
        assert!(default.has(Permissions::VIEW_CHANNEL));
        assert!(default.has(Permissions::CHANGE_PROFILE));
        assert!(!default.has(Permissions::ADMINISTRATOR));
        assert!(!default.has(Permissions::MANAGE_MESSAGES));
    }

    #[test]
    fn test_expand_admin() {
        let perms = Permissions::ADMINISTRATOR | Permissions::SEND_MESSAGES;
        assert_eq!(perms.expand_admin(), Permissions::ALL);
        assert_eq!(Permissions::DEFAULT.expand_admin(), Permissions::DEFAULT);
    }

    #[test]
    fn test_serialize_as_integer() {
        let perms = Permissions::ADMINISTRATOR | Permissions::INVITE_MEMBERS;
        assert_eq!(serde_json::to_string(&perms).unwrap(), "3");
    }

    #[test]
    fn test_deserialize_string_and_number() {
        let a: Permissions = serde_json::from_str("\"33\"").unwrap();
        let b: Permissions = serde_json::from_str("33").unwrap();
        assert_eq!(a, b);
        assert!(a.has(Permissions::SEND_MESSAGES));
    }

    #[test]
    fn test_i64_roundtrip_keeps_all() {
        assert_eq!(Permissions::from_i64(Permissions::ALL.to_i64()), Permissions::ALL);
    }

    #[test]
    fn test_list() {
        let list = (Permissions::VIEW_CHANNEL | Permissions::MANAGE_ROLES).list();
        assert_eq!(list, vec!["VIEW_CHANNEL", "MANAGE_ROLES"]);
    }
}
