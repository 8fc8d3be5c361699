//! Site settings row

use huddle_core::{RepoResult, Settings};
use sqlx::PgConnection;
use tracing::instrument;

use super::error::map_db_error;
use crate::models::SettingsModel;

#[instrument(skip(conn))]
pub async fn find(conn: &mut PgConnection) -> RepoResult<Option<Settings>> {
    let result = sqlx::query_as::<_, SettingsModel>(
        r#"
        SELECT site_name, login_message, default_permissions, uses_email, uses_invite_codes,
               uses_captcha, uses_login_captcha, captcha_site_key, captcha_secret_key
        FROM settings
        WHERE id = 1
        "#,
    )
    .fetch_optional(conn)
    .await
    .map_err(map_db_error)?;

    Ok(result.map(Settings::from))
}

#[instrument(skip(conn))]
pub async fn upsert(conn: &mut PgConnection, settings: &Settings) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (id, site_name, login_message, default_permissions, uses_email,
                              uses_invite_codes, uses_captcha, uses_login_captcha,
                              captcha_site_key, captcha_secret_key)
        VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO UPDATE SET
            site_name = EXCLUDED.site_name,
            login_message = EXCLUDED.login_message,
            default_permissions = EXCLUDED.default_permissions,
            uses_email = EXCLUDED.uses_email,
            uses_invite_codes = EXCLUDED.uses_invite_codes,
            uses_captcha = EXCLUDED.uses_captcha,
            uses_login_captcha = EXCLUDED.uses_login_captcha,
            captcha_site_key = EXCLUDED.captcha_site_key,
            captcha_secret_key = EXCLUDED.captcha_secret_key
        "#,
    )
    .bind(&settings.site_name)
    .bind(&settings.login_message)
    .bind(settings.default_permissions.to_i64())
    .bind(settings.uses_email)
    .bind(settings.uses_invite_codes)
    .bind(settings.uses_captcha)
    .bind(settings.uses_login_captcha)
    .bind(&settings.captcha_site_key)
    .bind(&settings.captcha_secret_key)
    .execute(conn)
    .await
    .map_err(map_db_error)?;

    Ok(())
}
