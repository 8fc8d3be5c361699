//! Site-wide settings

use serde::{Deserialize, Serialize};

use crate::value_objects::Permissions;

/// Public site configuration plus the captcha secret.
///
/// The secret is skipped by serde so it can never reach a client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub site_name: String,
    #[serde(default)]
    pub login_message: String,
    pub default_permissions: Permissions,
    #[serde(default)]
    pub uses_email: bool,
    #[serde(default)]
    pub uses_invite_codes: bool,
    #[serde(default)]
    pub uses_captcha: bool,
    #[serde(default)]
    pub uses_login_captcha: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub captcha_site_key: String,
    #[serde(skip)]
    pub captcha_secret_key: String,
}

impl Settings {
    pub fn new(site_name: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
            login_message: String::new(),
            default_permissions: Permissions::DEFAULT,
            uses_email: false,
            uses_invite_codes: false,
            uses_captcha: false,
            uses_login_captcha: false,
            captcha_site_key: String::new(),
            captcha_secret_key: String::new(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new("Huddle")
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("site_name", &self.site_name)
            .field("default_permissions", &self.default_permissions)
            .field("uses_email", &self.uses_email)
            .field("uses_invite_codes", &self.uses_invite_codes)
            .field("uses_captcha", &self.uses_captcha)
            .field("uses_login_captcha", &self.uses_login_captcha)
            .field("captcha_secret_key", &"[REDACTED]")
            .finish()
    }
}
