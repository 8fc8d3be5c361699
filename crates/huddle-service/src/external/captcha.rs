//! hCaptcha verification

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use huddle_core::{CaptchaVerifier, DomainError, Settings};
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

pub const HCAPTCHA_ENDPOINT: &str = "https://hcaptcha.com/siteverify";

/// How long a consumed response token is remembered
pub const USED_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
}

/// Verifies responses against hCaptcha's `siteverify` endpoint. Each response
/// token is accepted at most once.
#[derive(Debug)]
pub struct HCaptchaVerifier {
    client: Client,
    endpoint: String,
    used: Mutex<HashMap<String, Instant>>,
}

impl HCaptchaVerifier {
    pub fn new() -> Self {
        Self::with_endpoint(HCAPTCHA_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            used: Mutex::new(HashMap::new()),
        }
    }

    /// Record the token; `false` when it was already used.
    fn claim(&self, response: &str) -> bool {
        let now = Instant::now();
        let mut used = self.used.lock();
        used.retain(|_, at| now.duration_since(*at) < USED_TOKEN_TTL);
        if used.contains_key(response) {
            return false;
        }
        used.insert(response.to_string(), now);
        true
    }
}

impl Default for HCaptchaVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptchaVerifier for HCaptchaVerifier {
    #[instrument(skip_all)]
    async fn verify(&self, response: &str, settings: &Settings) -> Result<(), DomainError> {
        if response.is_empty() {
            return Err(DomainError::InvalidCaptcha);
        }
        if !self.claim(response) {
            debug!("Captcha response reused");
            return Err(DomainError::InvalidCaptcha);
        }

        let form = [
            ("secret", settings.captcha_secret_key.as_str()),
            ("sitekey", settings.captcha_site_key.as_str()),
            ("response", response),
        ];
        let reply = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| DomainError::ExternalError(e.to_string()))?;

        if reply.status() != StatusCode::OK {
            warn!(status = %reply.status(), "Captcha endpoint returned an error");
            return Err(DomainError::ExternalError(format!(
                "captcha endpoint returned {}",
                reply.status()
            )));
        }

        let result: SiteVerifyResponse = reply
            .json()
            .await
            .map_err(|e| DomainError::ExternalError(e.to_string()))?;
        if result.success {
            Ok(())
        } else {
            Err(DomainError::InvalidCaptcha)
        }
    }
}

/// Accepts every response; for deployments and tests without a captcha
/// provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllCaptcha;

#[async_trait]
impl CaptchaVerifier for AcceptAllCaptcha {
    async fn verify(&self, _response: &str, _settings: &Settings) -> Result<(), DomainError> {
        Ok(())
    }
}
