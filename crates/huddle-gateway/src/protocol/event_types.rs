//! Event type discriminators
//!
//! Every frame carries one of these integers in its `type` field. The
//! numbering has gaps; unassigned values are rejected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Gateway event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventType {
    ErrorResponse = 0,
    SettingsResponse = 1,
    OverviewResponse = 2,
    MessagesRequest = 3,
    MessagesResponse = 4,
    UsersRequest = 5,
    UsersResponse = 6,
    UserListRequest = 7,
    UserListResponse = 8,
    MessageSendRequest = 9,
    MessageSendResponse = 10,
    MessageAdd = 11,
    MessageUpdate = 12,
    MessageDelete = 13,
    ReactionAdd = 15,
    ReactionDelete = 16,
    ChannelAdd = 19,
    ChannelUpdate = 20,
    ChannelDelete = 21,
    RoleAdd = 23,
    RoleUpdate = 24,
    RoleDelete = 25,
    UserAdd = 26,
    UserUpdate = 28,
    UserPresence = 29,
    LoginRequest = 31,
    TokenResponse = 32,
    LogoutRequest = 33,
    RegisterRequest = 34,
    UploadSlotResponse = 35,
    MessageUpdateRequest = 36,
    MessageDeleteRequest = 37,
    ReactionAddRequest = 38,
    ReactionDeleteRequest = 39,
    ReactionUsersRequest = 40,
    ReactionUsersResponse = 41,
    UserUpdateRequest = 42,
    RoleAddRequest = 43,
    RoleUpdateRequest = 44,
    RoleDeleteRequest = 45,
    UserRoleAddRequest = 46,
    UserRoleDeleteRequest = 47,
    ChannelAddRequest = 48,
    ChannelUpdateRequest = 49,
    ChannelDeleteRequest = 50,
    InviteCreateRequest = 51,
    InviteCreateResponse = 52,
}

impl EventType {
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        let kind = match value {
            0 => Self::ErrorResponse,
            1 => Self::SettingsResponse,
            2 => Self::OverviewResponse,
            3 => Self::MessagesRequest,
            4 => Self::MessagesResponse,
            5 => Self::UsersRequest,
            6 => Self::UsersResponse,
            7 => Self::UserListRequest,
            8 => Self::UserListResponse,
            9 => Self::MessageSendRequest,
            10 => Self::MessageSendResponse,
            11 => Self::MessageAdd,
            12 => Self::MessageUpdate,
            13 => Self::MessageDelete,
            15 => Self::ReactionAdd,
            16 => Self::ReactionDelete,
            19 => Self::ChannelAdd,
            20 => Self::ChannelUpdate,
            21 => Self::ChannelDelete,
            23 => Self::RoleAdd,
            24 => Self::RoleUpdate,
            25 => Self::RoleDelete,
            26 => Self::UserAdd,
            28 => Self::UserUpdate,
            29 => Self::UserPresence,
            31 => Self::LoginRequest,
            32 => Self::TokenResponse,
            33 => Self::LogoutRequest,
            34 => Self::RegisterRequest,
            35 => Self::UploadSlotResponse,
            36 => Self::MessageUpdateRequest,
            37 => Self::MessageDeleteRequest,
            38 => Self::ReactionAddRequest,
            39 => Self::ReactionDeleteRequest,
            40 => Self::ReactionUsersRequest,
            41 => Self::ReactionUsersResponse,
            42 => Self::UserUpdateRequest,
            43 => Self::RoleAddRequest,
            44 => Self::RoleUpdateRequest,
            45 => Self::RoleDeleteRequest,
            46 => Self::UserRoleAddRequest,
            47 => Self::UserRoleDeleteRequest,
            48 => Self::ChannelAddRequest,
            49 => Self::ChannelUpdateRequest,
            50 => Self::ChannelDeleteRequest,
            51 => Self::InviteCreateRequest,
            52 => Self::InviteCreateResponse,
            _ => return None,
        };
        Some(kind)
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Whether a client may send this type
    #[must_use]
    pub const fn is_client_request(self) -> bool {
        matches!(
            self,
            Self::MessagesRequest
                | Self::UsersRequest
                | Self::UserListRequest
                | Self::MessageSendRequest
                | Self::LoginRequest
                | Self::LogoutRequest
                | Self::RegisterRequest
                | Self::MessageUpdateRequest
                | Self::MessageDeleteRequest
                | Self::ReactionAddRequest
                | Self::ReactionDeleteRequest
                | Self::ReactionUsersRequest
                | Self::UserUpdateRequest
                | Self::RoleAddRequest
                | Self::RoleUpdateRequest
                | Self::RoleDeleteRequest
                | Self::UserRoleAddRequest
                | Self::UserRoleDeleteRequest
                | Self::ChannelAddRequest
                | Self::ChannelUpdateRequest
                | Self::ChannelDeleteRequest
                | Self::InviteCreateRequest
        )
    }

    /// Requests accepted before the connection is authenticated
    #[must_use]
    pub const fn allowed_unauthenticated(self) -> bool {
        matches!(self, Self::LoginRequest | Self::RegisterRequest)
    }
}

impl Serialize for EventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(self.as_u16())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u16::deserialize(deserializer)?;
        Self::from_u16(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid event type: {value}")))
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.as_u16())
    }
}
