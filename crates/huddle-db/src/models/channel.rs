//! Channel and overwrite row models

use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ChannelModel {
    pub id: i64,
    pub kind: i16,
    pub name: String,
    pub description: String,
    pub position: i32,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OverwriteModel {
    pub channel_id: i64,
    pub target_id: i64,
    pub kind: i16,
    pub allow_bits: i64,
    pub deny_bits: i64,
}
