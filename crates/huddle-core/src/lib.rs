//! # huddle-core
//!
//! Domain layer for the huddle chat server: identifiers, permission bits,
//! the entities exchanged with clients, the pure permission resolver, and the
//! traits implemented by storage and the other external collaborators.
//! Nothing in this crate performs I/O.

pub mod entities;
pub mod error;
pub mod permission;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Attachment, AttachmentKind, Channel, ChannelKind, Embed, EmbedAuthor, EmbedField,
    EmbedFooter, EmbedKind, EmbedMedia, EmbedProvider, Message, Overwrite, OverwriteKind,
    Presence, Reaction, Role, Settings, User, AVATAR_DEFAULT, PROFILE_COLOR_DEFAULT,
};
pub use error::{DomainError, ErrorCode};
pub use permission::{
    compute_effective_rank, resolve_channel_permissions, resolve_user_permissions, NO_RANK,
};
pub use traits::{
    CaptchaVerifier, EmbedFetcher, MediaStore, MessageAnchor, NewAccount, NewAttachment,
    ProfileUpdate, RepoResult, Storage, StoredMedia, Transaction,
};
pub use value_objects::{
    now_millis, Permissions, Snowflake, SnowflakeError, SnowflakeGenerator, SnowflakeParseError,
};
