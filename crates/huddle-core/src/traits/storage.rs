//! Transactional storage interface
//!
//! Every read and write happens inside a [`Transaction`] obtained from
//! [`Storage::begin`]. Dropping a transaction without calling
//! [`Transaction::commit`] discards its writes.

use async_trait::async_trait;

use crate::entities::{Channel, Embed, Message, Role, Settings, User};
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Result type for storage operations
pub type RepoResult<T> = Result<T, DomainError>;

/// A registration ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user: User,
    pub password_hash: String,
    pub email: Option<String>,
}

/// Profile columns written by a user update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: String,
    pub status_message: String,
    pub profile_message: String,
    pub profile_color: i32,
    pub avatar_modified: i64,
}

/// Where a page of channel history starts.
///
/// Pages are always returned in ascending id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAnchor {
    /// The most recent messages
    Latest,
    /// Messages strictly older than the anchor
    Before(Snowflake),
    /// Messages strictly newer than the anchor
    After(Snowflake),
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Start a transaction. Writes become visible to other transactions only
    /// after commit.
    async fn begin(&self) -> RepoResult<Box<dyn Transaction>>;
}

#[async_trait]
pub trait Transaction: Send {
    async fn commit(self: Box<Self>) -> RepoResult<()>;

    async fn rollback(self: Box<Self>) -> RepoResult<()>;

    // ========================================================================
    // Settings
    // ========================================================================

    /// `None` before the first run has seeded anything
    async fn settings(&mut self) -> RepoResult<Option<Settings>>;

    async fn set_settings(&mut self, settings: &Settings) -> RepoResult<()>;

    // ========================================================================
    // Accounts, tokens and invites
    // ========================================================================

    /// User id and password hash for a username (case-insensitive)
    async fn credentials(&mut self, username: &str) -> RepoResult<Option<(Snowflake, String)>>;

    async fn username_taken(&mut self, username: &str) -> RepoResult<bool>;

    /// Insert the user row together with its password hash
    async fn create_account(&mut self, account: &NewAccount) -> RepoResult<()>;

    async fn issue_token(&mut self, user_id: Snowflake, token: &str) -> RepoResult<()>;

    /// Resolve a session token to its user
    async fn token_user(&mut self, token: &str) -> RepoResult<Option<Snowflake>>;

    async fn revoke_token(&mut self, token: &str) -> RepoResult<()>;

    async fn add_invite_code(&mut self, code: &str, created_by: Snowflake) -> RepoResult<()>;

    /// Remove the code, returning whether it existed
    async fn consume_invite_code(&mut self, code: &str) -> RepoResult<bool>;

    // ========================================================================
    // Users
    // ========================================================================

    async fn user(&mut self, id: Snowflake) -> RepoResult<Option<User>>;

    /// Every registered user, used to populate the index
    async fn users(&mut self) -> RepoResult<Vec<User>>;

    async fn set_user_profile(&mut self, id: Snowflake, profile: &ProfileUpdate)
        -> RepoResult<()>;

    async fn add_user_role(&mut self, user_id: Snowflake, role_id: Snowflake) -> RepoResult<()>;

    async fn remove_user_role(&mut self, user_id: Snowflake, role_id: Snowflake)
        -> RepoResult<()>;

    // ========================================================================
    // Roles
    // ========================================================================

    async fn role(&mut self, id: Snowflake) -> RepoResult<Option<Role>>;

    async fn roles(&mut self) -> RepoResult<Vec<Role>>;

    async fn add_role(&mut self, role: &Role) -> RepoResult<()>;

    async fn update_role(&mut self, role: &Role) -> RepoResult<()>;

    /// Delete a role and every assignment of it
    async fn delete_role(&mut self, id: Snowflake) -> RepoResult<()>;

    // ========================================================================
    // Channels
    // ========================================================================

    async fn channel(&mut self, id: Snowflake) -> RepoResult<Option<Channel>>;

    async fn channels(&mut self) -> RepoResult<Vec<Channel>>;

    async fn add_channel(&mut self, channel: &Channel) -> RepoResult<()>;

    /// Replace the channel row and its overwrites
    async fn update_channel(&mut self, channel: &Channel) -> RepoResult<()>;

    /// Delete a channel and all of its messages
    async fn delete_channel(&mut self, id: Snowflake) -> RepoResult<()>;

    // ========================================================================
    // Messages
    // ========================================================================

    async fn message(&mut self, id: Snowflake) -> RepoResult<Option<Message>>;

    /// Messages for the given ids, silently skipping unknown ones
    async fn messages_by_ids(&mut self, ids: &[Snowflake]) -> RepoResult<Vec<Message>>;

    async fn messages_by_anchor(
        &mut self,
        channel_id: Snowflake,
        anchor: MessageAnchor,
        limit: usize,
    ) -> RepoResult<Vec<Message>>;

    /// Insert a message with its attachments and mention lists
    async fn add_message(&mut self, message: &Message) -> RepoResult<()>;

    /// Write content, mentions and edit timestamp, and drop the listed embeds
    async fn edit_message(&mut self, message: &Message, removed_embeds: &[Snowflake])
        -> RepoResult<()>;

    async fn delete_message(&mut self, id: Snowflake) -> RepoResult<()>;

    async fn add_embed(&mut self, message_id: Snowflake, embed: &Embed) -> RepoResult<()>;

    // ========================================================================
    // Reactions
    // ========================================================================

    /// Idempotent: reacting twice with the same emoji is a no-op
    async fn add_reaction(
        &mut self,
        message_id: Snowflake,
        user_id: Snowflake,
        emoji_id: Snowflake,
    ) -> RepoResult<()>;

    async fn delete_reaction(
        &mut self,
        message_id: Snowflake,
        user_id: Snowflake,
        emoji_id: Snowflake,
    ) -> RepoResult<()>;

    async fn reaction_count(&mut self, message_id: Snowflake, emoji_id: Snowflake)
        -> RepoResult<i64>;

    /// Reactors in the order they reacted
    async fn reaction_users(
        &mut self,
        message_id: Snowflake,
        emoji_id: Snowflake,
    ) -> RepoResult<Vec<Snowflake>>;
}
