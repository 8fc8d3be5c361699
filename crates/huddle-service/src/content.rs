//! Mention and link extraction from message content

use std::sync::LazyLock;

use huddle_core::Snowflake;
use regex::Regex;

static USER_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<@([0-9]+)>").expect("valid pattern"));
static ROLE_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<@&([0-9]+)>").expect("valid pattern"));
static CHANNEL_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<#([0-9]+)>").expect("valid pattern"));
static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("valid pattern"));

/// Everything referenced by a message body, in order of appearance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedContent {
    pub users: Vec<Snowflake>,
    pub roles: Vec<Snowflake>,
    pub channels: Vec<Snowflake>,
    pub urls: Vec<String>,
}

fn ids(pattern: &Regex, content: &str) -> Vec<Snowflake> {
    pattern
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse::<i64>().ok())
        .map(Snowflake::new)
        .collect()
}

pub fn parse_content(content: &str) -> ParsedContent {
    ParsedContent {
        users: ids(&USER_MENTION, content),
        roles: ids(&ROLE_MENTION, content),
        channels: ids(&CHANNEL_MENTION, content),
        urls: URL
            .find_iter(content)
            .map(|m| m.as_str().to_string())
            .collect(),
    }
}
