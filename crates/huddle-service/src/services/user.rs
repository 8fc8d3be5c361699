//! User service
//!
//! Member lookups, list paging, the connection overview and profile
//! changes.

use huddle_core::{
    now_millis, DomainError, Permissions, ProfileUpdate, Snowflake, User,
    AVATAR_DEFAULT, PROFILE_COLOR_DEFAULT,
};
use tracing::{info, instrument};
use validator::Validate;

use crate::dto::{OverviewResponse, UserUpdateRequest, UsersResponse};
use crate::index::UserListSlice;

use super::context::ServiceContext;
use super::error::{require, ServiceError, ServiceResult};

/// Most entries returned by one user list request
pub const USER_LIST_LIMIT: usize = 128;

/// Window of the user list included in the overview
pub const OVERVIEW_WINDOW: usize = 20;

/// A checked profile change, waiting for its avatar upload when
/// `needs_avatar` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedProfile {
    pub target: Snowflake,
    pub profile: ProfileUpdate,
    pub needs_avatar: bool,
}

fn default_display_name(user: &User) -> String {
    User::new(user.id, user.username.as_str()).display_name
}

/// User service
pub struct UserService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> UserService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Known users among `ids`; unknown ids are skipped.
    pub fn users(&self, ids: &[Snowflake]) -> UsersResponse {
        UsersResponse {
            users: self.ctx.index().users(ids),
        }
    }

    pub fn user_list(&self, start: usize, end: usize) -> UserListSlice {
        self.ctx
            .index()
            .user_list_slice(start, end, USER_LIST_LIMIT)
    }

    /// Snapshot sent to a freshly authenticated connection.
    pub fn overview(&self, user_id: Snowflake) -> ServiceResult<OverviewResponse> {
        let index = self.ctx.index();
        let you = index
            .user(user_id)
            .ok_or(DomainError::UserNotFound(user_id))?;
        let user_list = index.user_list_slice(0, OVERVIEW_WINDOW, OVERVIEW_WINDOW);
        let users = index.users(&user_list.users);

        Ok(OverviewResponse {
            you,
            users,
            channels: index.channels(),
            roles: index.roles(),
            user_list,
        })
    }

    /// Check a profile change and resolve every field to its final value.
    ///
    /// Changing one's own profile needs `CHANGE_PROFILE`. Changing someone
    /// else's needs `MANAGE_PROFILES`, and without administrator only
    /// resetting fields to their defaults is allowed.
    #[instrument(skip(self, request), fields(target = %request.user))]
    pub fn prepare_update(
        &self,
        actor: Snowflake,
        request: UserUpdateRequest,
    ) -> ServiceResult<PreparedProfile> {
        request.validate()?;

        let index = self.ctx.index();
        let target = index
            .user(request.user)
            .ok_or(DomainError::UserNotFound(request.user))?;
        let perms = index.permissions(actor);
        let default_name = default_display_name(&target);
        let requested_name = request.display_name.trim();

        if target.id == actor {
            require(perms, Permissions::CHANGE_PROFILE)?;
        } else {
            require(perms, Permissions::MANAGE_PROFILES)?;

            if !perms.is_admin() {
                if request.set_name
                    && !requested_name.is_empty()
                    && requested_name != target.display_name
                    && requested_name != default_name
                {
                    return Err(ServiceError::forbidden("only a reset of the display name is allowed"));
                }
                if request.set_avatar && request.avatar_modified != AVATAR_DEFAULT {
                    return Err(ServiceError::forbidden("only a reset of the avatar is allowed"));
                }
                if request.set_profile {
                    let status_ok = request.status_message.is_empty()
                        || request.status_message == target.status_message;
                    let profile_ok = request.profile_message.is_empty()
                        || request.profile_message == target.profile_message;
                    let color_ok = request.profile_color == PROFILE_COLOR_DEFAULT
                        || request.profile_color == target.profile_color;
                    if !(status_ok && profile_ok && color_ok) {
                        return Err(ServiceError::forbidden("only a reset of the profile is allowed"));
                    }
                }
            }
        }

        let display_name = if !request.set_name {
            target.display_name.clone()
        } else if requested_name.is_empty() {
            default_name
        } else {
            requested_name.to_string()
        };

        let (status_message, profile_message, profile_color) = if request.set_profile {
            (
                request.status_message,
                request.profile_message,
                request.profile_color,
            )
        } else {
            (
                target.status_message.clone(),
                target.profile_message.clone(),
                target.profile_color,
            )
        };

        let needs_avatar = request.set_avatar && request.avatar_modified != AVATAR_DEFAULT;
        let avatar_modified = if request.set_avatar {
            request.avatar_modified
        } else {
            target.avatar_modified
        };

        Ok(PreparedProfile {
            target: target.id,
            profile: ProfileUpdate {
                display_name,
                status_message,
                profile_message,
                profile_color,
                avatar_modified,
            },
            needs_avatar,
        })
    }

    /// Store an uploaded avatar and stamp the profile with its revision.
    #[instrument(skip(self, prepared, data), fields(target = %prepared.target, size = data.len()))]
    pub async fn attach_avatar(&self, prepared: &mut PreparedProfile, data: &[u8]) -> ServiceResult<()> {
        self.ctx.media().store_avatar(prepared.target, data).await?;
        prepared.profile.avatar_modified = now_millis();
        prepared.needs_avatar = false;
        Ok(())
    }

    /// Write the profile of the target user and refresh the index.
    #[instrument(skip(self, prepared), fields(target = %prepared.target))]
    pub async fn finalize_update(&self, prepared: PreparedProfile) -> ServiceResult<User> {
        if prepared.needs_avatar {
            return Err(ServiceError::invalid_request("avatar upload missing"));
        }

        let mut tx = self.ctx.storage().begin().await?;
        tx.set_user_profile(prepared.target, &prepared.profile).await?;
        let user = tx
            .user(prepared.target)
            .await?
            .ok_or(DomainError::UserNotFound(prepared.target))?;
        tx.commit().await?;

        let user = self.ctx.index().update_user(user);
        info!("Profile updated");
        Ok(user)
    }
}
