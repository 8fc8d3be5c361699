//! User row models

use sqlx::FromRow;

/// User row joined with its role ids
#[derive(Debug, Clone, FromRow)]
pub struct UserModel {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub status_message: String,
    pub profile_message: String,
    pub profile_color: i32,
    pub avatar_modified: i64,
    pub roles: Vec<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CredentialsModel {
    pub id: i64,
    pub password_hash: String,
}
