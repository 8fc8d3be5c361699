//! Media, link-preview and captcha collaborators

use async_trait::async_trait;

use crate::entities::{Attachment, Embed, Settings};
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// One uploaded file destined to become an attachment.
#[derive(Debug, Clone, Copy)]
pub struct NewAttachment<'a> {
    pub id: Snowflake,
    pub filename: &'a str,
    pub data: &'a [u8],
}

/// A stored file read back for download.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub mimetype: String,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist the file and describe it (kind, mimetype, size, dimensions)
    async fn store_attachment(&self, upload: NewAttachment<'_>) -> Result<Attachment, DomainError>;

    /// Replace the avatar image of a user
    async fn store_avatar(&self, user_id: Snowflake, data: &[u8]) -> Result<(), DomainError>;

    async fn load_attachment(
        &self,
        id: Snowflake,
        filename: &str,
    ) -> Result<Option<StoredMedia>, DomainError>;

    async fn load_avatar(&self, user_id: Snowflake) -> Result<Option<StoredMedia>, DomainError>;
}

#[async_trait]
pub trait EmbedFetcher: Send + Sync {
    /// Build a preview for `url`. `Ok(None)` when the page offers nothing worth
    /// showing. The returned embed has a zero id; the caller assigns one.
    async fn fetch_embed(&self, url: &str) -> Result<Option<Embed>, DomainError>;
}

#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Verify a client's captcha response against the site's keys.
    ///
    /// Rejections are [`DomainError::InvalidCaptcha`]; transport failures are
    /// [`DomainError::ExternalError`].
    async fn verify(&self, response: &str, settings: &Settings) -> Result<(), DomainError>;
}
