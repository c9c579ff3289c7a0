//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use channel_sweep::client::{ChatClient, Cursor, DeleteOutcome};
use channel_sweep::config::Config;
use channel_sweep::confirm::{Choice, PromptId, PromptSurface};
use channel_sweep::error::{Result, SweepError};
use channel_sweep::models::{
    ChannelInfo, ChannelMessage, GuildRef, MemberInfo, ReactionEmoji, UserRef,
};
use channel_sweep::Snowflake;

pub const GUILD: u64 = 100;
pub const CHANNEL: u64 = 500;
pub const SECOND_CHANNEL: u64 = 501;
pub const MOD_USER: u64 = 700;
pub const AUTHOR_A: u64 = 600;
pub const AUTHOR_B: u64 = 601;

/// Realistic-length snowflake with a distinct embedded millisecond per
/// index; higher index means newer
pub fn id(n: u64) -> Snowflake {
    const ID_BASE: u64 = 1_000_000_000_000;
    Snowflake::from_raw((ID_BASE + n) << 22)
}

pub fn authorizer() -> UserRef {
    UserRef::new(id(MOD_USER), "mod#0001")
}

pub fn message(n: u64, channel: u64, author: u64, content: &str) -> ChannelMessage {
    ChannelMessage {
        id: id(n),
        channel_id: id(channel),
        author: UserRef::new(id(author), format!("author-{}", author)),
        content: content.to_string(),
        embed_count: 0,
        attachment_count: 0,
        reactions: Vec::new(),
    }
}

pub fn message_with_reaction(
    n: u64,
    channel: u64,
    author: u64,
    emoji_id: u64,
    emoji_name: &str,
) -> ChannelMessage {
    let mut msg = message(n, channel, author, "look at this");
    msg.reactions.push(ReactionEmoji {
        id: Some(Snowflake::from_raw(emoji_id)),
        name: emoji_name.to_string(),
        animated: false,
    });
    msg
}

/// Config pointed at a temp directory, with politeness delays zeroed so
/// tests run at full speed
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.to_path_buf();
    config.traversal.fetch_interval_ms = 0;
    config.traversal.delete_interval_ms = 0;
    config.traversal.job_interval_ms = 0;
    config.collection.save_emojis = true;
    config
}

/// In-memory platform honoring cursor, permission and membership
/// semantics
pub struct FakeChatClient {
    bot: UserRef,
    channels: HashMap<Snowflake, ChannelInfo>,
    messages: Mutex<HashMap<Snowflake, Vec<ChannelMessage>>>,
    members: HashSet<(Snowflake, Snowflake)>,
    denied: HashSet<Snowflake>,
    not_deletable: HashSet<Snowflake>,
    fail_fetch_on: Option<usize>,
    fetch_calls: AtomicUsize,
}

impl FakeChatClient {
    pub fn new() -> Self {
        Self {
            bot: UserRef::new(id(1), "sweeper#0000"),
            channels: HashMap::new(),
            messages: Mutex::new(HashMap::new()),
            members: HashSet::new(),
            denied: HashSet::new(),
            not_deletable: HashSet::new(),
            fail_fetch_on: None,
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// A guild channel plus history, with every known user a member
    pub fn with_channel(mut self, channel: u64, history: Vec<ChannelMessage>) -> Self {
        self.channels.insert(
            id(channel),
            ChannelInfo {
                id: id(channel),
                name: format!("channel-{}", channel),
                guild: Some(GuildRef {
                    id: id(GUILD),
                    name: "testers".to_string(),
                }),
            },
        );
        self.messages.lock().unwrap().insert(id(channel), history);
        for user in [MOD_USER, AUTHOR_A, AUTHOR_B, 1] {
            self.members.insert((id(GUILD), id(user)));
        }
        self
    }

    pub fn with_dm_channel(mut self, channel: u64) -> Self {
        self.channels.insert(
            id(channel),
            ChannelInfo {
                id: id(channel),
                name: String::new(),
                guild: None,
            },
        );
        self.messages
            .lock()
            .unwrap()
            .insert(id(channel), Vec::new());
        self
    }

    pub fn without_member(mut self, user: u64) -> Self {
        self.members.remove(&(id(GUILD), id(user)));
        self
    }

    pub fn deny_permission(mut self, user: u64) -> Self {
        self.denied.insert(id(user));
        self
    }

    pub fn not_deletable(mut self, message: u64) -> Self {
        self.not_deletable.insert(id(message));
        self
    }

    pub fn failing_fetch_on(mut self, call: usize) -> Self {
        self.fail_fetch_on = Some(call);
        self
    }

    pub fn remaining_messages(&self, channel: u64) -> Vec<Snowflake> {
        let mut ids: Vec<_> = self
            .messages
            .lock()
            .unwrap()
            .get(&id(channel))
            .map(|msgs| msgs.iter().map(|m| m.id).collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatClient for FakeChatClient {
    async fn fetch_page(
        &self,
        channel_id: Snowflake,
        limit: usize,
        cursor: Option<Cursor>,
    ) -> Result<Vec<ChannelMessage>> {
        let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if Some(call) == self.fail_fetch_on {
            return Err(SweepError::Fetch("HTTP 500 fetching messages".to_string()));
        }
        let messages = self.messages.lock().unwrap();
        let Some(history) = messages.get(&channel_id) else {
            return Err(SweepError::Fetch(format!(
                "HTTP 404 fetching messages in {}",
                channel_id
            )));
        };
        let mut page: Vec<ChannelMessage> = match cursor {
            Some(Cursor::Before(anchor)) => {
                let mut older: Vec<_> =
                    history.iter().filter(|m| m.id < anchor).cloned().collect();
                older.sort_by(|a, b| b.id.cmp(&a.id));
                older
            }
            Some(Cursor::After(anchor)) => {
                let mut newer: Vec<_> =
                    history.iter().filter(|m| m.id > anchor).cloned().collect();
                newer.sort_by(|a, b| a.id.cmp(&b.id));
                newer.truncate(limit);
                newer.sort_by(|a, b| b.id.cmp(&a.id));
                newer
            }
            None => {
                let mut all = history.clone();
                all.sort_by(|a, b| b.id.cmp(&a.id));
                all
            }
        };
        page.truncate(limit);
        Ok(page)
    }

    async fn delete_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> Result<DeleteOutcome> {
        if self.not_deletable.contains(&message_id) {
            return Ok(DeleteOutcome::NotDeletable);
        }
        if let Some(history) = self.messages.lock().unwrap().get_mut(&channel_id) {
            history.retain(|m| m.id != message_id);
        }
        Ok(DeleteOutcome::Deleted)
    }

    async fn resolve_channel(&self, channel_id: Snowflake) -> Result<Option<ChannelInfo>> {
        Ok(self.channels.get(&channel_id).cloned())
    }

    async fn resolve_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Option<MemberInfo>> {
        if self.members.contains(&(guild_id, user_id)) {
            Ok(Some(MemberInfo {
                user: UserRef::new(user_id, format!("member-{}", user_id)),
            }))
        } else {
            Ok(None)
        }
    }

    async fn can_manage_messages(
        &self,
        _channel_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<bool> {
        Ok(!self.denied.contains(&user_id))
    }

    fn current_user(&self) -> &UserRef {
        &self.bot
    }
}

/// Surface with a fixed answer, recording every finalize call
pub struct ScriptedSurface {
    answer: Option<Choice>,
    pub finalized: Mutex<Vec<String>>,
    pub presented: Mutex<Vec<String>>,
}

impl ScriptedSurface {
    pub fn confirming() -> Self {
        Self::with_answer(Some(Choice::Yes))
    }

    pub fn declining() -> Self {
        Self::with_answer(Some(Choice::No))
    }

    pub fn silent() -> Self {
        Self::with_answer(None)
    }

    fn with_answer(answer: Option<Choice>) -> Self {
        Self {
            answer,
            finalized: Mutex::new(Vec::new()),
            presented: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PromptSurface for ScriptedSurface {
    async fn present(&self, description: &str) -> Result<PromptId> {
        self.presented.lock().unwrap().push(description.to_string());
        Ok(PromptId(1))
    }

    async fn await_choice(
        &self,
        _prompt: PromptId,
        _requester: Snowflake,
        _timeout: Duration,
    ) -> Result<Option<Choice>> {
        Ok(self.answer)
    }

    async fn finalize(&self, _prompt: PromptId, text: &str) -> Result<()> {
        self.finalized.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
