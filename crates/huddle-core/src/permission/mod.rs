//! Permission resolution
//!
//! Pure functions over users, roles and channels. The index calls these when
//! recomputing cached user info; handlers reach them through the index.

mod resolver;

pub use resolver::{
    compute_effective_rank, resolve_channel_permissions, resolve_user_permissions, NO_RANK,
};
