//! Authentication service
//!
//! Handles login, registration, token resolution and logout.

use huddle_common::generate_token;
use huddle_core::{DomainError, NewAccount, Snowflake, User};
use tracing::{debug, info, instrument};
use validator::Validate;

use crate::dto::{LoginRequest, RegisterRequest, SettingsResponse};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;

/// Authentication service
pub struct AuthService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AuthService<'a> {
    /// Create a new AuthService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Public settings, independent of authentication
    pub fn settings(&self, authenticated: bool) -> SettingsResponse {
        SettingsResponse::new(&self.ctx.index().settings(), authenticated)
    }

    /// Resolve a session token to a known user
    #[instrument(skip_all)]
    pub async fn authenticate(&self, token: &str) -> ServiceResult<Snowflake> {
        if token.is_empty() {
            return Err(DomainError::InvalidToken.into());
        }
        let mut tx = self.ctx.storage().begin().await?;
        let user_id = tx.token_user(token).await?;
        tx.commit().await?;

        match user_id {
            Some(id) if self.ctx.index().user(id).is_some() => Ok(id),
            _ => Err(DomainError::InvalidToken.into()),
        }
    }

    /// Check credentials and issue a fresh token
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(&self, request: LoginRequest) -> ServiceResult<(Snowflake, String)> {
        request.validate()?;

        let settings = self.ctx.index().settings();
        if settings.uses_login_captcha {
            self.ctx
                .captcha()
                .verify(&request.captcha_response, &settings)
                .await?;
        }

        let credentials = {
            let mut tx = self.ctx.storage().begin().await?;
            let credentials = tx.credentials(&request.username).await?;
            tx.commit().await?;
            credentials
        };
        let Some((user_id, hash)) = credentials else {
            debug!("Unknown username");
            return Err(DomainError::InvalidCredentials.into());
        };

        self.ctx
            .passwords()
            .verify_or_error(&request.password, &hash)?;

        let token = generate_token();
        let mut tx = self.ctx.storage().begin().await?;
        tx.issue_token(user_id, &token).await?;
        tx.commit().await?;

        info!(user_id = %user_id, "User logged in");
        Ok((user_id, token))
    }

    /// Create an account and log it in
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<(User, String)> {
        request.validate()?;

        let username = request.username.trim();
        let length = username.chars().count();
        if !(USERNAME_MIN..=USERNAME_MAX).contains(&length) {
            return Err(DomainError::InvalidUsername(format!(
                "username must be between {USERNAME_MIN} and {USERNAME_MAX} characters long"
            ))
            .into());
        }

        let settings = self.ctx.index().settings();
        if settings.uses_captcha {
            self.ctx
                .captcha()
                .verify(&request.captcha_response, &settings)
                .await?;
        }
        if settings.uses_email && request.email.trim().is_empty() {
            return Err(ServiceError::invalid_request("email is required"));
        }

        let password_hash = self.ctx.passwords().hash(&request.password)?;
        let user = User::new(self.ctx.generate_id(), username);
        let token = generate_token();

        let mut tx = self.ctx.storage().begin().await?;
        if tx.username_taken(&user.username).await? {
            return Err(DomainError::UsernameTaken.into());
        }
        if settings.uses_invite_codes && !tx.consume_invite_code(&request.invite_code).await? {
            return Err(DomainError::InvalidInviteCode.into());
        }
        tx.create_account(&NewAccount {
            user: user.clone(),
            password_hash,
            email: Some(request.email).filter(|e| !e.trim().is_empty()),
        })
        .await?;
        tx.issue_token(user.id, &token).await?;
        tx.commit().await?;

        let user = self.ctx.index().add_user(user);
        info!(user_id = %user.id, "User registered");
        Ok((user, token))
    }

    #[instrument(skip_all)]
    pub async fn logout(&self, token: &str) -> ServiceResult<()> {
        let mut tx = self.ctx.storage().begin().await?;
        tx.revoke_token(token).await?;
        tx.commit().await?;
        Ok(())
    }
}
