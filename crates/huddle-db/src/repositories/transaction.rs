//! [`Storage`] and [`Transaction`] over a PostgreSQL pool

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use tracing::instrument;

use huddle_core::{
    Channel, Embed, Message, MessageAnchor, NewAccount, ProfileUpdate, RepoResult, Role,
    Settings, Snowflake, Storage, Transaction, User,
};

use super::error::map_db_error;
use super::{account, channel, message, reaction, role, settings, user};

/// PostgreSQL implementation of Storage
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Create a new PgStorage
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Storage for PgStorage {
    #[instrument(skip(self))]
    async fn begin(&self) -> RepoResult<Box<dyn Transaction>> {
        let tx = self.pool.begin().await.map_err(map_db_error)?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// One open database transaction. Dropping it rolls back.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self: Box<Self>) -> RepoResult<()> {
        self.tx.commit().await.map_err(map_db_error)
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        self.tx.rollback().await.map_err(map_db_error)
    }

    async fn settings(&mut self) -> RepoResult<Option<Settings>> {
        settings::find(&mut self.tx).await
    }

    async fn set_settings(&mut self, value: &Settings) -> RepoResult<()> {
        settings::upsert(&mut self.tx, value).await
    }

    async fn credentials(&mut self, username: &str) -> RepoResult<Option<(Snowflake, String)>> {
        account::find_credentials(&mut self.tx, username).await
    }

    async fn username_taken(&mut self, username: &str) -> RepoResult<bool> {
        account::username_exists(&mut self.tx, username).await
    }

    async fn create_account(&mut self, new_account: &NewAccount) -> RepoResult<()> {
        account::create(&mut self.tx, new_account).await
    }

    async fn issue_token(&mut self, user_id: Snowflake, token: &str) -> RepoResult<()> {
        account::insert_token(&mut self.tx, user_id, token).await
    }

    async fn token_user(&mut self, token: &str) -> RepoResult<Option<Snowflake>> {
        account::find_token_user(&mut self.tx, token).await
    }

    async fn revoke_token(&mut self, token: &str) -> RepoResult<()> {
        account::delete_token(&mut self.tx, token).await
    }

    async fn add_invite_code(&mut self, code: &str, created_by: Snowflake) -> RepoResult<()> {
        account::insert_invite(&mut self.tx, code, created_by).await
    }

    async fn consume_invite_code(&mut self, code: &str) -> RepoResult<bool> {
        account::consume_invite(&mut self.tx, code).await
    }

    async fn user(&mut self, id: Snowflake) -> RepoResult<Option<User>> {
        user::find_by_id(&mut self.tx, id).await
    }

    async fn users(&mut self) -> RepoResult<Vec<User>> {
        user::find_all(&mut self.tx).await
    }

    async fn set_user_profile(&mut self, id: Snowflake, profile: &ProfileUpdate) -> RepoResult<()> {
        user::update_profile(&mut self.tx, id, profile).await
    }

    async fn add_user_role(&mut self, user_id: Snowflake, role_id: Snowflake) -> RepoResult<()> {
        user::add_role(&mut self.tx, user_id, role_id).await
    }

    async fn remove_user_role(&mut self, user_id: Snowflake, role_id: Snowflake) -> RepoResult<()> {
        user::remove_role(&mut self.tx, user_id, role_id).await
    }

    async fn role(&mut self, id: Snowflake) -> RepoResult<Option<Role>> {
        role::find_by_id(&mut self.tx, id).await
    }

    async fn roles(&mut self) -> RepoResult<Vec<Role>> {
        role::find_all(&mut self.tx).await
    }

    async fn add_role(&mut self, value: &Role) -> RepoResult<()> {
        role::create(&mut self.tx, value).await
    }

    async fn update_role(&mut self, value: &Role) -> RepoResult<()> {
        role::update(&mut self.tx, value).await
    }

    async fn delete_role(&mut self, id: Snowflake) -> RepoResult<()> {
        role::delete(&mut self.tx, id).await
    }

    async fn channel(&mut self, id: Snowflake) -> RepoResult<Option<Channel>> {
        channel::find_by_id(&mut self.tx, id).await
    }

    async fn channels(&mut self) -> RepoResult<Vec<Channel>> {
        channel::find_all(&mut self.tx).await
    }

    async fn add_channel(&mut self, value: &Channel) -> RepoResult<()> {
        channel::create(&mut self.tx, value).await
    }

    async fn update_channel(&mut self, value: &Channel) -> RepoResult<()> {
        channel::update(&mut self.tx, value).await
    }

    async fn delete_channel(&mut self, id: Snowflake) -> RepoResult<()> {
        channel::delete(&mut self.tx, id).await
    }

    async fn message(&mut self, id: Snowflake) -> RepoResult<Option<Message>> {
        message::find_by_id(&mut self.tx, id).await
    }

    async fn messages_by_ids(&mut self, ids: &[Snowflake]) -> RepoResult<Vec<Message>> {
        message::find_by_ids(&mut self.tx, ids).await
    }

    async fn messages_by_anchor(
        &mut self,
        channel_id: Snowflake,
        anchor: MessageAnchor,
        limit: usize,
    ) -> RepoResult<Vec<Message>> {
        message::find_by_anchor(&mut self.tx, channel_id, anchor, limit).await
    }

    async fn add_message(&mut self, value: &Message) -> RepoResult<()> {
        message::create(&mut self.tx, value).await
    }

    async fn edit_message(&mut self, value: &Message, removed_embeds: &[Snowflake]) -> RepoResult<()> {
        message::update(&mut self.tx, value, removed_embeds).await
    }

    async fn delete_message(&mut self, id: Snowflake) -> RepoResult<()> {
        message::delete(&mut self.tx, id).await
    }

    async fn add_embed(&mut self, message_id: Snowflake, embed: &Embed) -> RepoResult<()> {
        message::add_embed(&mut self.tx, message_id, embed).await
    }

    async fn add_reaction(
        &mut self,
        message_id: Snowflake,
        user_id: Snowflake,
        emoji_id: Snowflake,
    ) -> RepoResult<()> {
        reaction::create(&mut self.tx, message_id, user_id, emoji_id).await
    }

    async fn delete_reaction(
        &mut self,
        message_id: Snowflake,
        user_id: Snowflake,
        emoji_id: Snowflake,
    ) -> RepoResult<()> {
        reaction::delete(&mut self.tx, message_id, user_id, emoji_id).await
    }

    async fn reaction_count(&mut self, message_id: Snowflake, emoji_id: Snowflake) -> RepoResult<i64> {
        reaction::count(&mut self.tx, message_id, emoji_id).await
    }

    async fn reaction_users(
        &mut self,
        message_id: Snowflake,
        emoji_id: Snowflake,
    ) -> RepoResult<Vec<Snowflake>> {
        reaction::find_users(&mut self.tx, message_id, emoji_id).await
    }
}
