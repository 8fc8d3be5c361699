//! [`Storage`] over process memory

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use huddle_core::{
    Channel, DomainError, Embed, Message, MessageAnchor, NewAccount, OverwriteKind, ProfileUpdate,
    RepoResult, Role, Settings, Snowflake, Storage, Transaction, User,
};

use super::state::{Account, MemoryState, ReactionRow};

/// Shared in-memory storage. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage").finish_non_exhaustive()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn begin(&self) -> RepoResult<Box<dyn Transaction>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

/// Exclusive access to the store plus the uncommitted copy being edited
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl MemoryTransaction {
    fn message_mut(&mut self, id: Snowflake) -> RepoResult<&mut Message> {
        self.working
            .messages
            .get_mut(&id)
            .ok_or(DomainError::MessageNotFound(id))
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> RepoResult<()> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        debug!("Memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        Ok(())
    }

    async fn settings(&mut self) -> RepoResult<Option<Settings>> {
        Ok(self.working.settings.clone())
    }

    async fn set_settings(&mut self, settings: &Settings) -> RepoResult<()> {
        self.working.settings = Some(settings.clone());
        Ok(())
    }

    async fn credentials(&mut self, username: &str) -> RepoResult<Option<(Snowflake, String)>> {
        let Some(user) = self.working.find_username(username) else {
            return Ok(None);
        };
        Ok(self
            .working
            .accounts
            .get(&user.id)
            .map(|account| (user.id, account.password_hash.clone())))
    }

    async fn username_taken(&mut self, username: &str) -> RepoResult<bool> {
        Ok(self.working.find_username(username).is_some())
    }

    async fn create_account(&mut self, account: &NewAccount) -> RepoResult<()> {
        if self.working.find_username(&account.user.username).is_some() {
            return Err(DomainError::UsernameTaken);
        }
        let mut user = account.user.clone();
        user.roles.sort();
        user.roles.dedup();
        self.working.accounts.insert(
            user.id,
            Account {
                password_hash: account.password_hash.clone(),
            },
        );
        self.working.users.insert(user.id, user);
        Ok(())
    }

    async fn issue_token(&mut self, user_id: Snowflake, token: &str) -> RepoResult<()> {
        self.working.tokens.insert(token.to_string(), user_id);
        Ok(())
    }

    async fn token_user(&mut self, token: &str) -> RepoResult<Option<Snowflake>> {
        Ok(self.working.tokens.get(token).copied())
    }

    async fn revoke_token(&mut self, token: &str) -> RepoResult<()> {
        self.working.tokens.remove(token);
        Ok(())
    }

    async fn add_invite_code(&mut self, code: &str, created_by: Snowflake) -> RepoResult<()> {
        self.working.invite_codes.insert(code.to_string(), created_by);
        Ok(())
    }

    async fn consume_invite_code(&mut self, code: &str) -> RepoResult<bool> {
        Ok(self.working.invite_codes.remove(code).is_some())
    }

    async fn user(&mut self, id: Snowflake) -> RepoResult<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn users(&mut self) -> RepoResult<Vec<User>> {
        Ok(self.working.users.values().cloned().collect())
    }

    async fn set_user_profile(&mut self, id: Snowflake, profile: &ProfileUpdate) -> RepoResult<()> {
        let user = self
            .working
            .users
            .get_mut(&id)
            .ok_or(DomainError::UserNotFound(id))?;
        user.display_name.clone_from(&profile.display_name);
        user.status_message.clone_from(&profile.status_message);
        user.profile_message.clone_from(&profile.profile_message);
        user.profile_color = profile.profile_color;
        user.avatar_modified = profile.avatar_modified;
        Ok(())
    }

    async fn add_user_role(&mut self, user_id: Snowflake, role_id: Snowflake) -> RepoResult<()> {
        if !self.working.roles.contains_key(&role_id) {
            return Err(DomainError::RoleNotFound(role_id));
        }
        let user = self
            .working
            .users
            .get_mut(&user_id)
            .ok_or(DomainError::UserNotFound(user_id))?;
        if let Err(pos) = user.roles.binary_search(&role_id) {
            user.roles.insert(pos, role_id);
        }
        Ok(())
    }

    async fn remove_user_role(&mut self, user_id: Snowflake, role_id: Snowflake) -> RepoResult<()> {
        if let Some(user) = self.working.users.get_mut(&user_id) {
            user.roles.retain(|r| *r != role_id);
        }
        Ok(())
    }

    async fn role(&mut self, id: Snowflake) -> RepoResult<Option<Role>> {
        Ok(self.working.roles.get(&id).cloned())
    }

    async fn roles(&mut self) -> RepoResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.working.roles.values().cloned().collect();
        roles.sort_by_key(Role::order_key);
        Ok(roles)
    }

    async fn add_role(&mut self, role: &Role) -> RepoResult<()> {
        self.working.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn update_role(&mut self, role: &Role) -> RepoResult<()> {
        match self.working.roles.get_mut(&role.id) {
            Some(existing) => {
                *existing = role.clone();
                Ok(())
            }
            None => Err(DomainError::RoleNotFound(role.id)),
        }
    }

    async fn delete_role(&mut self, id: Snowflake) -> RepoResult<()> {
        self.working.roles.remove(&id);
        for user in self.working.users.values_mut() {
            user.roles.retain(|r| *r != id);
        }
        for channel in self.working.channels.values_mut() {
            channel
                .overwrites
                .retain(|o| !(o.kind == OverwriteKind::Role && o.id == id));
        }
        Ok(())
    }

    async fn channel(&mut self, id: Snowflake) -> RepoResult<Option<Channel>> {
        Ok(self.working.channels.get(&id).cloned())
    }

    async fn channels(&mut self) -> RepoResult<Vec<Channel>> {
        let mut channels: Vec<Channel> = self.working.channels.values().cloned().collect();
        channels.sort_by_key(|c| (c.position, c.id));
        Ok(channels)
    }

    async fn add_channel(&mut self, channel: &Channel) -> RepoResult<()> {
        self.working.channels.insert(channel.id, channel.clone());
        Ok(())
    }

    async fn update_channel(&mut self, channel: &Channel) -> RepoResult<()> {
        match self.working.channels.get_mut(&channel.id) {
            Some(existing) => {
                *existing = channel.clone();
                Ok(())
            }
            None => Err(DomainError::ChannelNotFound(channel.id)),
        }
    }

    async fn delete_channel(&mut self, id: Snowflake) -> RepoResult<()> {
        self.working.channels.remove(&id);
        let doomed: Vec<Snowflake> = self
            .working
            .messages
            .values()
            .filter(|m| m.channel == id)
            .map(|m| m.id)
            .collect();
        for message_id in doomed {
            self.working.remove_message(message_id);
        }
        Ok(())
    }

    async fn message(&mut self, id: Snowflake) -> RepoResult<Option<Message>> {
        Ok(self.working.messages.get(&id).map(|m| self.working.hydrate(m)))
    }

    async fn messages_by_ids(&mut self, ids: &[Snowflake]) -> RepoResult<Vec<Message>> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(ids
            .iter()
            .filter_map(|id| self.working.messages.get(id))
            .map(|m| self.working.hydrate(m))
            .collect())
    }

    async fn messages_by_anchor(
        &mut self,
        channel_id: Snowflake,
        anchor: MessageAnchor,
        limit: usize,
    ) -> RepoResult<Vec<Message>> {
        let in_channel = self
            .working
            .messages
            .values()
            .filter(|m| m.channel == channel_id);

        let mut page: Vec<&Message> = match anchor {
            MessageAnchor::Latest => in_channel.rev().take(limit).collect(),
            MessageAnchor::Before(before) => {
                in_channel.rev().filter(|m| m.id < before).take(limit).collect()
            }
            MessageAnchor::After(after) => in_channel.filter(|m| m.id > after).take(limit).collect(),
        };
        page.sort_by_key(|m| m.id);

        Ok(page.into_iter().map(|m| self.working.hydrate(m)).collect())
    }

    async fn add_message(&mut self, message: &Message) -> RepoResult<()> {
        if !self.working.channels.contains_key(&message.channel) {
            return Err(DomainError::ChannelNotFound(message.channel));
        }
        let mut stored = message.clone();
        stored.reactions.clear();
        stored.embeddable_urls.clear();
        self.working.messages.insert(stored.id, stored);
        Ok(())
    }

    async fn edit_message(&mut self, message: &Message, removed_embeds: &[Snowflake]) -> RepoResult<()> {
        let stored = self.message_mut(message.id)?;
        stored.content.clone_from(&message.content);
        stored.edited_timestamp = message.edited_timestamp;
        stored.mentioned_users.clone_from(&message.mentioned_users);
        stored.mentioned_roles.clone_from(&message.mentioned_roles);
        stored.mentioned_channels.clone_from(&message.mentioned_channels);
        stored.embeds.retain(|e| !removed_embeds.contains(&e.id));
        Ok(())
    }

    async fn delete_message(&mut self, id: Snowflake) -> RepoResult<()> {
        self.working.remove_message(id);
        Ok(())
    }

    async fn add_embed(&mut self, message_id: Snowflake, embed: &Embed) -> RepoResult<()> {
        let stored = self.message_mut(message_id)?;
        stored.embeds.push(embed.clone());
        Ok(())
    }

    async fn add_reaction(
        &mut self,
        message_id: Snowflake,
        user_id: Snowflake,
        emoji_id: Snowflake,
    ) -> RepoResult<()> {
        if !self.working.messages.contains_key(&message_id) {
            return Err(DomainError::MessageNotFound(message_id));
        }
        let row = ReactionRow { user_id, emoji_id };
        let rows = self.working.reactions.entry(message_id).or_default();
        if !rows.contains(&row) {
            rows.push(row);
        }
        Ok(())
    }

    async fn delete_reaction(
        &mut self,
        message_id: Snowflake,
        user_id: Snowflake,
        emoji_id: Snowflake,
    ) -> RepoResult<()> {
        if let Some(rows) = self.working.reactions.get_mut(&message_id) {
            rows.retain(|r| !(r.user_id == user_id && r.emoji_id == emoji_id));
        }
        Ok(())
    }

    async fn reaction_count(&mut self, message_id: Snowflake, emoji_id: Snowflake) -> RepoResult<i64> {
        let count = self
            .working
            .reactions
            .get(&message_id)
            .map_or(0, |rows| rows.iter().filter(|r| r.emoji_id == emoji_id).count());
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn reaction_users(
        &mut self,
        message_id: Snowflake,
        emoji_id: Snowflake,
    ) -> RepoResult<Vec<Snowflake>> {
        Ok(self
            .working
            .reactions
            .get(&message_id)
            .into_iter()
            .flatten()
            .filter(|r| r.emoji_id == emoji_id)
            .map(|r| r.user_id)
            .collect())
    }
}
