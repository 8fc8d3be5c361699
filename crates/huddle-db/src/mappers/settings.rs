//! Settings entity <-> model mapper

use huddle_core::{Permissions, Settings};

use crate::models::SettingsModel;

impl From<SettingsModel> for Settings {
    fn from(model: SettingsModel) -> Self {
        Settings {
            site_name: model.site_name,
            login_message: model.login_message,
            default_permissions: Permissions::from_i64(model.default_permissions),
            uses_email: model.uses_email,
            uses_invite_codes: model.uses_invite_codes,
            uses_captcha: model.uses_captcha,
            uses_login_captcha: model.uses_login_captcha,
            captcha_site_key: model.captcha_site_key,
            captcha_secret_key: model.captcha_secret_key,
        }
    }
}
