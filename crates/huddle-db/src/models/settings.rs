//! Settings row model

use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct SettingsModel {
    pub site_name: String,
    pub login_message: String,
    pub default_permissions: i64,
    pub uses_email: bool,
    pub uses_invite_codes: bool,
    pub uses_captcha: bool,
    pub uses_login_captcha: bool,
    pub captcha_site_key: String,
    pub captcha_secret_key: String,
}
