//! Domain entities exchanged between storage, the index and clients

mod channel;
mod embed;
mod message;
mod role;
mod settings;
mod user;

pub use channel::{Channel, ChannelKind, Overwrite, OverwriteKind};
pub use embed::{Embed, EmbedAuthor, EmbedField, EmbedFooter, EmbedKind, EmbedMedia, EmbedProvider};
pub use message::{Attachment, AttachmentKind, Message, Reaction};
pub use role::Role;
pub use settings::Settings;
pub use user::{Presence, User, AVATAR_DEFAULT, PROFILE_COLOR_DEFAULT};

/// Error for integer discriminators that name no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: i64,
}
