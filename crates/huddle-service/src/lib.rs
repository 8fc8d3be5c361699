//! # huddle-service
//!
//! Application layer: the in-memory [`Index`], the request services that
//! the gateway dispatches to, message content parsing, concrete media,
//! link-preview and captcha collaborators, and first-run seeding.

pub mod bootstrap;
pub mod content;
pub mod dto;
pub mod external;
pub mod index;
pub mod services;

pub use index::{Index, IndexRange, UserInfo, UserListGroup, UserListSlice};
pub use services::{ServiceContext, ServiceContextBuilder, ServiceError, ServiceResult};
