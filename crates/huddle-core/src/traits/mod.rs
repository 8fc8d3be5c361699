//! Collaborator traits (ports)
//!
//! The domain states what it needs from durable storage and from the media,
//! link-preview and captcha services; other crates provide implementations.

mod collaborators;
mod storage;

pub use collaborators::{CaptchaVerifier, EmbedFetcher, MediaStore, NewAttachment, StoredMedia};
pub use storage::{MessageAnchor, NewAccount, ProfileUpdate, RepoResult, Storage, Transaction};
