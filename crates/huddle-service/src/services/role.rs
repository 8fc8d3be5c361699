//! Role service
//!
//! Role definitions and role assignment. Every operation needs
//! `MANAGE_ROLES`; assignment additionally follows the rank hierarchy, where
//! a lower position outranks a higher one.

use huddle_core::{DomainError, Permissions, Role, Snowflake, User};
use tracing::{info, instrument};
use validator::Validate;

use crate::dto::{RoleAddRequest, RoleDeleteRequest, RoleUpdateRequest, UserRoleRequest};

use super::context::ServiceContext;
use super::error::{require, ServiceError, ServiceResult};

/// Role service
pub struct RoleService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> RoleService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    fn require_manage(&self, actor: Snowflake) -> ServiceResult<()> {
        require(self.ctx.index().permissions(actor), Permissions::MANAGE_ROLES)
    }

    /// Create a role
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn add(&self, actor: Snowflake, request: RoleAddRequest) -> ServiceResult<Role> {
        request.validate()?;
        self.require_manage(actor)?;

        let mut role = Role::new(self.ctx.generate_id(), request.name, request.position);
        role.color = request.color;
        role.permissions = request.permissions;
        role.hoisted = request.hoisted;
        role.mentionable = request.mentionable;

        let mut tx = self.ctx.storage().begin().await?;
        tx.add_role(&role).await?;
        let role = tx
            .role(role.id)
            .await?
            .ok_or(DomainError::RoleNotFound(role.id))?;
        tx.commit().await?;

        self.ctx.index().add_role(role.clone());
        info!(role_id = %role.id, "Role created");
        Ok(role)
    }

    /// Replace every field of an existing role
    #[instrument(skip(self, request), fields(role_id = %request.role.id))]
    pub async fn update(&self, actor: Snowflake, request: RoleUpdateRequest) -> ServiceResult<Role> {
        self.require_manage(actor)?;
        let role_id = request.role.id;
        if request.role.name.trim().is_empty() {
            return Err(ServiceError::invalid_request("role name must not be empty"));
        }

        let mut tx = self.ctx.storage().begin().await?;
        if tx.role(role_id).await?.is_none() {
            return Err(DomainError::RoleNotFound(role_id).into());
        }
        tx.update_role(&request.role).await?;
        let role = tx
            .role(role_id)
            .await?
            .ok_or(DomainError::RoleNotFound(role_id))?;
        tx.commit().await?;

        self.ctx.index().update_role(role.clone());
        info!("Role updated");
        Ok(role)
    }

    /// Delete a role, its assignments and the overwrites naming it
    #[instrument(skip(self, request), fields(role_id = %request.role))]
    pub async fn delete(&self, actor: Snowflake, request: RoleDeleteRequest) -> ServiceResult<Snowflake> {
        self.require_manage(actor)?;

        let mut tx = self.ctx.storage().begin().await?;
        if tx.role(request.role).await?.is_none() {
            return Err(DomainError::RoleNotFound(request.role).into());
        }
        tx.delete_role(request.role).await?;
        tx.commit().await?;

        self.ctx.index().delete_role(request.role);
        info!("Role deleted");
        Ok(request.role)
    }

    /// Rank checks shared by granting and revoking.
    ///
    /// Only users ranked strictly below the actor may be changed (the actor
    /// themself excepted), and only with roles positioned below the actor.
    fn check_hierarchy(&self, actor: Snowflake, target: Snowflake, role: &Role) -> ServiceResult<()> {
        let index = self.ctx.index();
        let actor_rank = index.rank(actor);
        let target_rank = index.rank(target);

        if target != actor && target_rank <= actor_rank {
            return Err(ServiceError::forbidden("target outranks the actor"));
        }
        if role.position <= actor_rank {
            return Err(ServiceError::forbidden("role outranks the actor"));
        }
        Ok(())
    }

    fn load_pair(&self, request: &UserRoleRequest) -> ServiceResult<(User, Role)> {
        let index = self.ctx.index();
        let user = index
            .user(request.user)
            .ok_or(DomainError::UserNotFound(request.user))?;
        let role = index
            .role(request.role)
            .ok_or(DomainError::RoleNotFound(request.role))?;
        Ok((user, role))
    }

    /// Grant a role. `None` when the user already holds it.
    #[instrument(skip(self))]
    pub async fn add_user_role(
        &self,
        actor: Snowflake,
        request: UserRoleRequest,
    ) -> ServiceResult<Option<User>> {
        self.require_manage(actor)?;
        let (user, role) = self.load_pair(&request)?;
        if user.has_role(role.id) {
            return Ok(None);
        }
        self.check_hierarchy(actor, user.id, &role)?;

        let mut tx = self.ctx.storage().begin().await?;
        tx.add_user_role(user.id, role.id).await?;
        let user = tx
            .user(user.id)
            .await?
            .ok_or(DomainError::UserNotFound(user.id))?;
        tx.commit().await?;

        info!("Role granted");
        Ok(Some(self.ctx.index().update_user(user)))
    }

    /// Revoke a role. `None` when the user does not hold it.
    #[instrument(skip(self))]
    pub async fn remove_user_role(
        &self,
        actor: Snowflake,
        request: UserRoleRequest,
    ) -> ServiceResult<Option<User>> {
        self.require_manage(actor)?;
        let (user, role) = self.load_pair(&request)?;
        if !user.has_role(role.id) {
            return Ok(None);
        }
        self.check_hierarchy(actor, user.id, &role)?;

        let mut tx = self.ctx.storage().begin().await?;
        tx.remove_user_role(user.id, role.id).await?;
        let user = tx
            .user(user.id)
            .await?
            .ok_or(DomainError::UserNotFound(user.id))?;
        tx.commit().await?;

        info!("Role revoked");
        Ok(Some(self.ctx.index().update_user(user)))
    }
}
