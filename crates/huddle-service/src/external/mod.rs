//! Concrete collaborators behind the `huddle-core` traits

pub mod captcha;
pub mod embed;
pub mod media;

pub use captcha::{AcceptAllCaptcha, HCaptchaVerifier};
pub use embed::{DisabledEmbedFetcher, HttpEmbedFetcher};
pub use media::FsMediaStore;
