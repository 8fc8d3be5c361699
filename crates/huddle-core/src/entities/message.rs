//! Message entity with its attachments and reactions

use serde::{Deserialize, Serialize};

use super::{Embed, UnknownVariant};
use crate::value_objects::Snowflake;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum AttachmentKind {
    #[default]
    File = 0,
    Image = 1,
    Video = 2,
}

impl From<AttachmentKind> for u8 {
    fn from(kind: AttachmentKind) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for AttachmentKind {
    type Error = UnknownVariant;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::File),
            1 => Ok(Self::Image),
            2 => Ok(Self::Video),
            _ => Err(UnknownVariant {
                kind: "attachment type",
                value: i64::from(value),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: Snowflake,
    pub filename: String,
    #[serde(rename = "type", default)]
    pub kind: AttachmentKind,
    pub mimetype: String,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
}

/// Aggregated reactions for one emoji on one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: Snowflake,
    pub count: i64,
    /// The earliest reactors, enough for a tooltip
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<Snowflake>,
}

impl Reaction {
    /// How many reactor ids are carried alongside the count.
    pub const PREVIEW_USERS: usize = 5;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Snowflake,
    #[serde(rename = "type", default)]
    pub kind: u8,
    pub channel: Snowflake,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pinned: bool,
    pub author: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Snowflake>,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_users: Vec<Snowflake>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_roles: Vec<Snowflake>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_channels: Vec<Snowflake>,
    /// URLs still waiting for a link preview; never persisted
    #[serde(rename = "embeddableURLs", default, skip_serializing_if = "Vec::is_empty")]
    pub embeddable_urls: Vec<String>,
}

impl Message {
    pub const KIND_DEFAULT: u8 = 0;

    pub fn is_author(&self, user_id: Snowflake) -> bool {
        self.author == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_json_shape() {
        let message = Message {
            id: Snowflake::new(10),
            channel: Snowflake::new(2),
            author: Snowflake::new(3),
            timestamp: 1_000,
            content: "hi".to_string(),
            embeddable_urls: vec!["https://example.com".to_string()],
            ..Message::default()
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], 0);
        assert_eq!(json["channel"], "2");
        assert_eq!(json["embeddableURLs"][0], "https://example.com");
        assert!(json.get("pinned").is_none());
        assert!(json.get("reference").is_none());
    }
}
