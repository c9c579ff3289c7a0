use serde::{Deserialize, Serialize};

use crate::snowflake::Snowflake;

/// A platform user, carried as id plus display tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Snowflake,
    pub tag: String,
}

impl UserRef {
    pub fn new(id: Snowflake, tag: impl Into<String>) -> Self {
        Self { id, tag: tag.into() }
    }

    /// "tag (id)" form used in analytics and log lines
    pub fn describe(&self) -> String {
        format!("{} ({})", self.tag, self.id)
    }
}

/// A guild the bot can see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildRef {
    pub id: Snowflake,
    pub name: String,
}

/// A resolved channel
///
/// `guild` is `None` for direct-message channels, which bulk operations
/// refuse to touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: Snowflake,
    pub name: String,
    pub guild: Option<GuildRef>,
}

impl ChannelInfo {
    /// "#name (id) in guild (id)" form used in analytics and log lines
    pub fn describe(&self) -> String {
        match &self.guild {
            Some(guild) => format!(
                "#{} ({}) in {} ({})",
                self.name, self.id, guild.name, guild.id
            ),
            None => format!("#{} ({})", self.name, self.id),
        }
    }
}

/// A guild member resolved through the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub user: UserRef,
}

/// An emoji attached to a message as a reaction
///
/// `id` is `None` for unicode emoji, which are never collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEmoji {
    pub id: Option<Snowflake>,
    pub name: String,
    pub animated: bool,
}

/// One message out of a fetched history page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub author: UserRef,
    pub content: String,
    pub embed_count: usize,
    pub attachment_count: usize,
    pub reactions: Vec<ReactionEmoji>,
}

/// Side effect applied to each valid message of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Delete,
    Collect,
    DeleteAndCollect,
}

impl Effect {
    pub fn deletes(&self) -> bool {
        matches!(self, Effect::Delete | Effect::DeleteAndCollect)
    }

    pub fn collects(&self) -> bool {
        matches!(self, Effect::Collect | Effect::DeleteAndCollect)
    }

    /// Verb used in confirmation prompts and status lines
    pub fn describe(&self) -> &'static str {
        match self {
            Effect::Delete => "delete messages",
            Effect::Collect => "collect emojis",
            Effect::DeleteAndCollect => "delete messages and collect emojis",
        }
    }
}

/// Immutable per-run input
#[derive(Debug, Clone)]
pub struct RunParameters {
    pub channel_id: Snowflake,
    /// When set, only messages by this author are valid
    pub user_id: Option<Snowflake>,
    /// Upper boundary id: traversal starts just below it
    pub before: Option<Snowflake>,
    /// Lower boundary id: traversal stops once it is reached
    pub after: Option<Snowflake>,
    pub effect: Effect,
    pub authorizer: UserRef,
}

/// One distinct custom emoji observed during a Collect effect
///
/// Deduplicated by id and never overwritten once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiRecord {
    pub id: Snowflake,
    pub name: String,
    pub animated: bool,
}
