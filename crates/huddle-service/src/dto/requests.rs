//! Request payloads
//!
//! All request DTOs implement `Deserialize`; the ones with free-form input
//! also implement `Validate`. Zero ids mean "not set".

use huddle_core::{Channel, ChannelKind, Overwrite, Permissions, Role, Snowflake};
use serde::Deserialize;
use validator::Validate;

// ============================================================================
// Auth Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[serde(default)]
    pub captcha_response: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,

    #[validate(length(min = 1, max = 1024, message = "Password is required"))]
    pub password: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub invite_code: String,

    #[serde(default)]
    pub captcha_response: String,
}

// ============================================================================
// Message Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesRequest {
    pub channel: Snowflake,
    #[serde(default)]
    pub before: Snowflake,
    #[serde(default)]
    pub after: Snowflake,
    #[serde(default)]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendRequest {
    pub channel: Snowflake,

    #[validate(length(max = 4000, message = "Message content is too long"))]
    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub reference: Snowflake,

    #[validate(range(max = 10, message = "Too many attachments"))]
    #[serde(default)]
    pub attachment_count: u32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MessageUpdateRequest {
    pub message: Snowflake,

    #[validate(length(max = 4000, message = "Message content is too long"))]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeleteRequest {
    pub message: Snowflake,
}

/// Shared by reaction add, delete and the reactor listing
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionRequest {
    pub message: Snowflake,
    pub emoji: Snowflake,
}

// ============================================================================
// User Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct UsersRequest {
    pub users: Vec<Snowflake>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UserListRequest {
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
}

/// Profile change. Each `set*` flag selects which group of fields applies;
/// unselected fields keep their current values.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateRequest {
    pub user: Snowflake,

    #[serde(default)]
    pub set_name: bool,
    #[validate(length(max = 32, message = "Display name is too long"))]
    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub set_profile: bool,
    #[validate(length(max = 128, message = "Status message is too long"))]
    #[serde(default)]
    pub status_message: String,
    #[validate(length(max = 2048, message = "Profile message is too long"))]
    #[serde(default)]
    pub profile_message: String,
    #[serde(default = "default_profile_color")]
    pub profile_color: i32,

    #[serde(default)]
    pub set_avatar: bool,
    #[serde(default)]
    pub avatar_modified: i64,
}

fn default_profile_color() -> i32 {
    huddle_core::PROFILE_COLOR_DEFAULT
}

// ============================================================================
// Role Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RoleAddRequest {
    #[validate(length(min = 1, max = 64, message = "Role name must be 1-64 characters"))]
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

#[derive(Debug, Clone, Deserialize)]
pub struct RoleUpdateRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleDeleteRequest {
    pub role: Snowflake,
}

/// Shared by user-role add and delete
#[derive(Debug, Clone, Deserialize)]
pub struct UserRoleRequest {
    pub user: Snowflake,
    pub role: Snowflake,
}

// ============================================================================
// Channel Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChannelAddRequest {
    #[validate(length(min = 1, max = 64, message = "Channel name must be 1-64 characters"))]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ChannelKind,
    #[validate(length(max = 1024, message = "Description is too long"))]
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub parent: Option<Snowflake>,
    #[serde(default)]
    pub overwrites: Vec<Overwrite>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelUpdateRequest {
    pub channel: Channel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelDeleteRequest {
    pub channel: Snowflake,
}
