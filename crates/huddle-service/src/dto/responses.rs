//! Response and event payloads
//!
//! Everything here serializes to the camelCase JSON clients expect.

use huddle_core::{
    Channel, ErrorCode, Message, Permissions, Presence, Role, Settings, Snowflake, User,
};
use serde::Serialize;

use crate::index::UserListSlice;

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    /// Type of the request that failed
    pub request: u16,
}

/// Public site settings plus whether this connection is logged in
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub site_name: String,
    pub login_message: String,
    pub default_permissions: Permissions,
    pub authenticated: bool,
    pub uses_email: bool,
    pub uses_invite_codes: bool,
    pub uses_captcha: bool,
    pub uses_login_captcha: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub captcha_site_key: String,
}

impl SettingsResponse {
    pub fn new(settings: &Settings, authenticated: bool) -> Self {
        Self {
            site_name: settings.site_name.clone(),
            login_message: settings.login_message.clone(),
            default_permissions: settings.default_permissions,
            authenticated,
            uses_email: settings.uses_email,
            uses_invite_codes: settings.uses_invite_codes,
            uses_captcha: settings.uses_captcha,
            uses_login_captcha: settings.uses_login_captcha,
            captcha_site_key: settings.captcha_site_key.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewResponse {
    pub you: User,
    /// Users listed in `user_list`
    pub users: Vec<User>,
    pub channels: Vec<Channel>,
    pub roles: Vec<Role>,
    pub user_list: UserListSlice,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadSlotResponse {
    pub slot: Snowflake,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MessagesResponse {
    pub channel: Snowflake,
    #[serde(skip_serializing_if = "Snowflake::is_zero")]
    pub before: Snowflake,
    #[serde(skip_serializing_if = "Snowflake::is_zero")]
    pub after: Snowflake,
    pub limit: usize,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageSendResponse {
    pub message: Snowflake,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageAddEvent {
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageUpdateEvent {
    pub message: Message,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageDeleteEvent {
    pub message: Snowflake,
}

/// Reaction add and delete
#[derive(Debug, Clone, Serialize)]
pub struct ReactionEvent {
    pub message: Snowflake,
    pub user: Snowflake,
    pub emoji: Snowflake,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReactionUsersResponse {
    pub message: Snowflake,
    pub emoji: Snowflake,
    pub users: Vec<Snowflake>,
}

// ============================================================================
// Users, roles, channels
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

/// User add and update
#[derive(Debug, Clone, Serialize)]
pub struct UserEvent {
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPresenceEvent {
    pub user: Snowflake,
    pub presence: Presence,
}

/// Role add and update
#[derive(Debug, Clone, Serialize)]
pub struct RoleEvent {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleDeleteEvent {
    pub role: Snowflake,
}

/// Channel add and update
#[derive(Debug, Clone, Serialize)]
pub struct ChannelEvent {
    pub channel: Channel,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelDeleteEvent {
    pub channel: Snowflake,
}

#[derive(Debug, Clone, Serialize)]
pub struct InviteCreateResponse {
    pub code: String,
}
