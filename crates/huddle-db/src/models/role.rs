//! Role row model

use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct RoleModel {
    pub id: i64,
    pub name: String,
    pub color: i32,
    pub position: i32,
    pub permissions: i64,
    pub hoisted: bool,
    pub mentionable: bool,
}
