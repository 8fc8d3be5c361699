//! Invite code service

use huddle_common::generate_invite_code;
use huddle_core::{Permissions, Snowflake};
use tracing::{info, instrument};

use crate::dto::InviteCreateResponse;

use super::context::ServiceContext;
use super::error::{require, ServiceResult};

pub struct InviteService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> InviteService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Issue a single-use registration code.
    #[instrument(skip(self))]
    pub async fn create(&self, actor: Snowflake) -> ServiceResult<InviteCreateResponse> {
        require(self.ctx.index().permissions(actor), Permissions::INVITE_MEMBERS)?;

        let code = generate_invite_code();
        let mut tx = self.ctx.storage().begin().await?;
        tx.add_invite_code(&code, actor).await?;
        tx.commit().await?;

        info!("Invite code created");
        Ok(InviteCreateResponse { code })
    }
}
