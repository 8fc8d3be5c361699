//! Request services
//!
//! One service per request family. Each borrows the shared
//! [`ServiceContext`], checks permissions against the index, runs a single
//! storage transaction and keeps the index in step with what was committed.

pub mod auth;
pub mod channel;
pub mod context;
pub mod error;
pub mod invite;
pub mod message;
pub mod reaction;
pub mod role;
pub mod user;

// Re-export all services for convenience
pub use auth::AuthService;
pub use channel::ChannelService;
pub use context::{ServiceContext, ServiceContextBuilder};
pub use error::{require, ServiceError, ServiceResult};
pub use invite::InviteService;
pub use message::{MessageEdit, MessageService, UploadedFile};
pub use reaction::ReactionService;
pub use role::RoleService;
pub use user::{PreparedProfile, UserService};
