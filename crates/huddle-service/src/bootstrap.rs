//! First-run seeding
//!
//! An empty store gets its settings, an "Admin" role, a "general" channel
//! and, when credentials are configured, an administrator account. Stores
//! that already carry settings are left alone.

use huddle_common::BootstrapConfig;
use huddle_core::{Channel, NewAccount, Permissions, Role, Settings, User};
use tracing::{info, instrument};

use crate::services::{ServiceContext, ServiceError, ServiceResult};

pub const ADMIN_ROLE_NAME: &str = "Admin";
pub const DEFAULT_CHANNEL_NAME: &str = "general";

/// Seed an empty store. Returns whether anything was written.
#[instrument(skip(ctx, config))]
pub async fn bootstrap(
    ctx: &ServiceContext,
    site_name: &str,
    config: &BootstrapConfig,
) -> ServiceResult<bool> {
    let admin = match (&config.admin_username, &config.admin_password) {
        (Some(username), Some(password)) => {
            let username = username.trim();
            if username.is_empty() || password.is_empty() {
                return Err(ServiceError::invalid_request(
                    "administrator username and password must not be empty",
                ));
            }
            Some((username.to_string(), ctx.passwords().hash(password)?))
        }
        _ => None,
    };

    let mut tx = ctx.storage().begin().await?;
    if tx.settings().await?.is_some() {
        tx.rollback().await?;
        return Ok(false);
    }

    tx.set_settings(&Settings::new(site_name)).await?;

    let mut role = Role::new(ctx.generate_id(), ADMIN_ROLE_NAME, 0);
    role.hoisted = true;
    role.permissions = Permissions::ADMINISTRATOR;
    tx.add_role(&role).await?;

    tx.add_channel(&Channel::text(ctx.generate_id(), DEFAULT_CHANNEL_NAME))
        .await?;

    if let Some((username, password_hash)) = admin {
        let user = User::new(ctx.generate_id(), username);
        tx.create_account(&NewAccount {
            user: user.clone(),
            password_hash,
            email: None,
        })
        .await?;
        tx.add_user_role(user.id, role.id).await?;
        info!(user_id = %user.id, username = %user.username, "Administrator account created");
    }

    tx.commit().await?;
    info!("Store seeded");
    Ok(true)
}
