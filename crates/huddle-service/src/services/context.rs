//! Service context - dependency container for services
//!
//! Holds storage, the shared index and the external collaborators.

use std::sync::Arc;

use huddle_common::PasswordService;
use huddle_core::{
    CaptchaVerifier, EmbedFetcher, MediaStore, Snowflake, SnowflakeGenerator, Storage,
};
use tokio_util::sync::CancellationToken;

use super::error::{ServiceError, ServiceResult};
use crate::index::Index;

/// Service context containing all dependencies
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct ServiceContext {
    storage: Arc<dyn Storage>,
    index: Arc<Index>,
    snowflakes: Arc<SnowflakeGenerator>,
    media: Arc<dyn MediaStore>,
    embeds: Arc<dyn EmbedFetcher>,
    captcha: Arc<dyn CaptchaVerifier>,
    passwords: PasswordService,
    /// Root cancellation scope for detached work
    shutdown: CancellationToken,
}

impl ServiceContext {
    pub fn builder() -> ServiceContextBuilder {
        ServiceContextBuilder::new()
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn index(&self) -> &Index {
        self.index.as_ref()
    }

    /// Shared handle to the index, for tasks that outlive a request
    pub fn index_handle(&self) -> Arc<Index> {
        Arc::clone(&self.index)
    }

    pub fn media(&self) -> &dyn MediaStore {
        self.media.as_ref()
    }

    pub fn embeds(&self) -> &dyn EmbedFetcher {
        self.embeds.as_ref()
    }

    pub fn captcha(&self) -> &dyn CaptchaVerifier {
        self.captcha.as_ref()
    }

    pub fn passwords(&self) -> &PasswordService {
        &self.passwords
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Generate a new Snowflake ID
    pub fn generate_id(&self) -> Snowflake {
        self.snowflakes.generate()
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("index", &"Index")
            .field("snowflakes", &self.snowflakes)
            .field("collaborators", &"...")
            .finish()
    }
}

/// Builder for creating ServiceContext
#[derive(Default)]
pub struct ServiceContextBuilder {
    storage: Option<Arc<dyn Storage>>,
    index: Option<Arc<Index>>,
    snowflakes: Option<Arc<SnowflakeGenerator>>,
    media: Option<Arc<dyn MediaStore>>,
    embeds: Option<Arc<dyn EmbedFetcher>>,
    captcha: Option<Arc<dyn CaptchaVerifier>>,
    shutdown: Option<CancellationToken>,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn index(mut self, index: Arc<Index>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn snowflakes(mut self, generator: Arc<SnowflakeGenerator>) -> Self {
        self.snowflakes = Some(generator);
        self
    }

    pub fn media(mut self, media: Arc<dyn MediaStore>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn embeds(mut self, embeds: Arc<dyn EmbedFetcher>) -> Self {
        self.embeds = Some(embeds);
        self
    }

    pub fn captcha(mut self, captcha: Arc<dyn CaptchaVerifier>) -> Self {
        self.captcha = Some(captcha);
        self
    }

    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Build the ServiceContext
    ///
    /// # Errors
    /// Returns `ServiceError::Internal` if a required dependency is missing.
    /// The index defaults to an empty one and the cancellation scope to a
    /// fresh token.
    pub fn build(self) -> ServiceResult<ServiceContext> {
        Ok(ServiceContext {
            storage: self
                .storage
                .ok_or_else(|| ServiceError::internal("storage is required"))?,
            index: self.index.unwrap_or_default(),
            snowflakes: self
                .snowflakes
                .ok_or_else(|| ServiceError::internal("snowflake generator is required"))?,
            media: self
                .media
                .ok_or_else(|| ServiceError::internal("media store is required"))?,
            embeds: self
                .embeds
                .ok_or_else(|| ServiceError::internal("embed fetcher is required"))?,
            captcha: self
                .captcha
                .ok_or_else(|| ServiceError::internal("captcha verifier is required"))?,
            passwords: PasswordService::new(),
            shutdown: self.shutdown.unwrap_or_default(),
        })
    }
}
