//! Value objects - small copyable types shared by every layer

mod permissions;
mod snowflake;

pub use permissions::Permissions;
pub use snowflake::{now_millis, Snowflake, SnowflakeError, SnowflakeGenerator, SnowflakeParseError};
