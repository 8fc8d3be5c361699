//! Tables of the in-memory store

use std::collections::{BTreeMap, HashMap};

use huddle_core::{Channel, Message, Role, Settings, Snowflake, User};

#[derive(Debug, Clone)]
pub(crate) struct Account {
    pub password_hash: String,
}

/// One user's reaction, kept in insertion order per message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReactionRow {
    pub user_id: Snowflake,
    pub emoji_id: Snowflake,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryState {
    pub settings: Option<Settings>,
    pub users: BTreeMap<Snowflake, User>,
    pub accounts: HashMap<Snowflake, Account>,
    pub tokens: HashMap<String, Snowflake>,
    pub invite_codes: HashMap<String, Snowflake>,
    pub roles: BTreeMap<Snowflake, Role>,
    pub channels: BTreeMap<Snowflake, Channel>,
    /// Stored without reactions; those are summarized on read
    pub messages: BTreeMap<Snowflake, Message>,
    pub reactions: HashMap<Snowflake, Vec<ReactionRow>>,
}

impl MemoryState {
    pub fn find_username(&self, username: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
    }

    /// Copy of a stored message with its reaction summary attached
    pub fn hydrate(&self, message: &Message) -> Message {
        let mut message = message.clone();
        let mut summary: Vec<huddle_core::Reaction> = Vec::new();
        for row in self.reactions.get(&message.id).into_iter().flatten() {
            match summary.iter_mut().find(|r| r.emoji == row.emoji_id) {
                Some(reaction) => {
                    reaction.count += 1;
                    if reaction.users.len() < huddle_core::Reaction::PREVIEW_USERS {
                        reaction.users.push(row.user_id);
                    }
                }
                None => summary.push(huddle_core::Reaction {
                    emoji: row.emoji_id,
                    count: 1,
                    users: vec![row.user_id],
                }),
            }
        }
        message.reactions = summary;
        message
    }

    pub fn remove_message(&mut self, id: Snowflake) {
        self.messages.remove(&id);
        self.reactions.remove(&id);
    }
}
