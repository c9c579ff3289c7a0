//! Chat-platform client
//!
//! The engine consumes the platform through the [`ChatClient`] trait;
//! [`RestChatClient`] implements it over the platform's HTTP API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, SweepError};
use crate::models::{
    ChannelInfo, ChannelMessage, GuildRef, MemberInfo, ReactionEmoji, UserRef,
};
use crate::snowflake::Snowflake;

/// Permission bit for managing (and bulk deleting) messages
pub const MANAGE_MESSAGES: u64 = 1 << 13;
/// Permission bit that short-circuits every other check
pub const ADMINISTRATOR: u64 = 1 << 3;

/// Pagination pointer for a history fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Fetch messages strictly older than this id
    Before(Snowflake),
    /// Fetch messages strictly newer than this id
    After(Snowflake),
}

/// Result of a delete attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Age or permission constraints make this message untouchable;
    /// skipped, never retried
    NotDeletable,
}

/// Platform operations the sweep engine requires
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Fetch one page of channel history relative to `cursor`
    ///
    /// `limit` is a hard upper bound, not a guarantee; a page shorter
    /// than `limit` means the history is exhausted in that direction.
    async fn fetch_page(
        &self,
        channel_id: Snowflake,
        limit: usize,
        cursor: Option<Cursor>,
    ) -> Result<Vec<ChannelMessage>>;

    /// Delete a single message
    async fn delete_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> Result<DeleteOutcome>;

    /// Resolve a channel, or `None` when it (or its guild) is gone or
    /// unavailable
    async fn resolve_channel(&self, channel_id: Snowflake) -> Result<Option<ChannelInfo>>;

    /// Resolve a guild member, or `None` when they are not in the guild
    async fn resolve_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Option<MemberInfo>>;

    /// Whether `user_id` holds Manage Messages in the given channel
    async fn can_manage_messages(&self, channel_id: Snowflake, user_id: Snowflake)
        -> Result<bool>;

    /// The automation's own user
    fn current_user(&self) -> &UserRef;
}

// --- wire payloads ---

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: Snowflake,
    username: String,
    #[serde(default)]
    discriminator: Option<String>,
}

impl ApiUser {
    fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some("0") | Some("") | None => self.username.clone(),
            Some(discriminator) => format!("{}#{}", self.username, discriminator),
        }
    }

    fn into_ref(self) -> UserRef {
        let tag = self.tag();
        UserRef { id: self.id, tag }
    }
}

#[derive(Debug, Deserialize)]
struct ApiEmoji {
    id: Option<Snowflake>,
    name: Option<String>,
    #[serde(default)]
    animated: bool,
}

#[derive(Debug, Deserialize)]
struct ApiReaction {
    emoji: ApiEmoji,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    id: Snowflake,
    channel_id: Snowflake,
    author: ApiUser,
    #[serde(default)]
    content: String,
    #[serde(default)]
    embeds: Vec<serde_json::Value>,
    #[serde(default)]
    attachments: Vec<serde_json::Value>,
    #[serde(default)]
    reactions: Vec<ApiReaction>,
}

impl From<ApiMessage> for ChannelMessage {
    fn from(message: ApiMessage) -> Self {
        ChannelMessage {
            id: message.id,
            channel_id: message.channel_id,
            author: message.author.into_ref(),
            content: message.content,
            embed_count: message.embeds.len(),
            attachment_count: message.attachments.len(),
            reactions: message
                .reactions
                .into_iter()
                .map(|r| ReactionEmoji {
                    id: r.emoji.id,
                    name: r.emoji.name.unwrap_or_default(),
                    animated: r.emoji.animated,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiOverwrite {
    id: Snowflake,
    #[serde(rename = "type")]
    kind: u8,
    allow: String,
    deny: String,
}

const OVERWRITE_ROLE: u8 = 0;
const OVERWRITE_MEMBER: u8 = 1;

#[derive(Debug, Deserialize)]
struct ApiChannel {
    id: Snowflake,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    guild_id: Option<Snowflake>,
    #[serde(default)]
    permission_overwrites: Vec<ApiOverwrite>,
}

#[derive(Debug, Deserialize)]
struct ApiRole {
    id: Snowflake,
    permissions: String,
}

#[derive(Debug, Deserialize)]
struct ApiGuild {
    id: Snowflake,
    name: String,
    #[serde(default)]
    roles: Vec<ApiRole>,
}

#[derive(Debug, Deserialize)]
struct ApiMember {
    user: ApiUser,
    #[serde(default)]
    roles: Vec<Snowflake>,
}

fn parse_permissions(raw: &str) -> u64 {
    raw.parse().unwrap_or(0)
}

/// Effective permissions of a member in a channel: role union, the
/// administrator shortcut, then channel overwrites (everyone, roles,
/// member) in that order
fn compute_channel_permissions(
    guild_id: Snowflake,
    guild_roles: &[ApiRole],
    member_role_ids: &[Snowflake],
    user_id: Snowflake,
    overwrites: &[ApiOverwrite],
) -> u64 {
    let mut base = 0u64;
    for role in guild_roles {
        // the @everyone role shares the guild id
        if role.id == guild_id || member_role_ids.contains(&role.id) {
            base |= parse_permissions(&role.permissions);
        }
    }
    if base & ADMINISTRATOR != 0 {
        return u64::MAX;
    }

    let mut permissions = base;
    if let Some(everyone) = overwrites
        .iter()
        .find(|o| o.kind == OVERWRITE_ROLE && o.id == guild_id)
    {
        permissions &= !parse_permissions(&everyone.deny);
        permissions |= parse_permissions(&everyone.allow);
    }

    let mut role_allow = 0u64;
    let mut role_deny = 0u64;
    for overwrite in overwrites
        .iter()
        .filter(|o| o.kind == OVERWRITE_ROLE && o.id != guild_id && member_role_ids.contains(&o.id))
    {
        role_allow |= parse_permissions(&overwrite.allow);
        role_deny |= parse_permissions(&overwrite.deny);
    }
    permissions &= !role_deny;
    permissions |= role_allow;

    if let Some(member) = overwrites
        .iter()
        .find(|o| o.kind == OVERWRITE_MEMBER && o.id == user_id)
    {
        permissions &= !parse_permissions(&member.deny);
        permissions |= parse_permissions(&member.allow);
    }

    permissions
}

/// Production client over the platform's REST API
pub struct RestChatClient {
    http: reqwest::Client,
    api_base: String,
    bot_user: UserRef,
}

impl RestChatClient {
    /// Build a client around an already-known bot identity
    pub fn new(api_base: impl Into<String>, token: &str, bot_user: UserRef) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bot {}", token))
            .map_err(|_| SweepError::Config("bot token contains invalid characters".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        let http = reqwest::Client::builder()
            .user_agent(concat!("channel-sweep/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_user,
        })
    }

    /// Connect and learn the bot's own identity from the platform
    pub async fn connect(api_base: &str, token: &str) -> Result<Self> {
        let placeholder = UserRef::new(Snowflake::from_raw(0), String::new());
        let mut client = Self::new(api_base, token, placeholder)?;
        let me: ApiUser = client.get_json(&format!("{}/users/@me", client.api_base)).await?;
        client.bot_user = me.into_ref();
        debug!("connected as {}", client.bot_user.describe());
        Ok(client)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SweepError::Api(format!("HTTP {} for {}", status, url)));
        }
        Ok(response.json().await?)
    }

    /// Like `get_json` but maps a 404 to `None`
    async fn get_json_optional<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SweepError::Api(format!("HTTP {} for {}", status, url)));
        }
        Ok(Some(response.json().await?))
    }

    async fn fetch_channel(&self, channel_id: Snowflake) -> Result<Option<ApiChannel>> {
        self.get_json_optional(&format!("{}/channels/{}", self.api_base, channel_id))
            .await
    }

    async fn fetch_guild(&self, guild_id: Snowflake) -> Result<Option<ApiGuild>> {
        self.get_json_optional(&format!("{}/guilds/{}", self.api_base, guild_id))
            .await
    }

    async fn fetch_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Option<ApiMember>> {
        self.get_json_optional(&format!(
            "{}/guilds/{}/members/{}",
            self.api_base, guild_id, user_id
        ))
        .await
    }
}

#[async_trait]
impl ChatClient for RestChatClient {
    async fn fetch_page(
        &self,
        channel_id: Snowflake,
        limit: usize,
        cursor: Option<Cursor>,
    ) -> Result<Vec<ChannelMessage>> {
        let mut request = self
            .http
            .get(format!("{}/channels/{}/messages", self.api_base, channel_id))
            .query(&[("limit", limit.to_string())]);
        match cursor {
            Some(Cursor::Before(id)) => request = request.query(&[("before", id.to_string())]),
            Some(Cursor::After(id)) => request = request.query(&[("after", id.to_string())]),
            None => {}
        }
        let response = request
            .send()
            .await
            .map_err(|e| SweepError::Fetch(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SweepError::Fetch(format!(
                "HTTP {} fetching messages in {}",
                status, channel_id
            )));
        }
        let page: Vec<ApiMessage> = response
            .json()
            .await
            .map_err(|e| SweepError::Fetch(e.to_string()))?;
        Ok(page.into_iter().map(ChannelMessage::from).collect())
    }

    async fn delete_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> Result<DeleteOutcome> {
        let response = self
            .http
            .delete(format!(
                "{}/channels/{}/messages/{}",
                self.api_base, channel_id, message_id
            ))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(DeleteOutcome::Deleted)
        } else if status == reqwest::StatusCode::FORBIDDEN {
            // system messages and permission gaps come back as 403
            Ok(DeleteOutcome::NotDeletable)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            // already gone; deletes are idempotent
            Ok(DeleteOutcome::Deleted)
        } else {
            Err(SweepError::Api(format!(
                "HTTP {} deleting message {}",
                status, message_id
            )))
        }
    }

    async fn resolve_channel(&self, channel_id: Snowflake) -> Result<Option<ChannelInfo>> {
        let Some(channel) = self.fetch_channel(channel_id).await? else {
            return Ok(None);
        };
        let guild = match channel.guild_id {
            Some(guild_id) => match self.fetch_guild(guild_id).await? {
                Some(guild) => Some(GuildRef {
                    id: guild.id,
                    name: guild.name,
                }),
                // channel exists but its guild is unavailable
                None => return Ok(None),
            },
            None => None,
        };
        Ok(Some(ChannelInfo {
            id: channel.id,
            name: channel.name.unwrap_or_default(),
            guild,
        }))
    }

    async fn resolve_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Option<MemberInfo>> {
        Ok(self
            .fetch_member(guild_id, user_id)
            .await?
            .map(|member| MemberInfo {
                user: member.user.into_ref(),
            }))
    }

    async fn can_manage_messages(
        &self,
        channel_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<bool> {
        let Some(channel) = self.fetch_channel(channel_id).await? else {
            return Ok(false);
        };
        let Some(guild_id) = channel.guild_id else {
            return Ok(false);
        };
        let Some(guild) = self.fetch_guild(guild_id).await? else {
            return Ok(false);
        };
        let Some(member) = self.fetch_member(guild_id, user_id).await? else {
            return Ok(false);
        };
        let permissions = compute_channel_permissions(
            guild_id,
            &guild.roles,
            &member.roles,
            user_id,
            &channel.permission_overwrites,
        );
        Ok(permissions & MANAGE_MESSAGES != 0)
    }

    fn current_user(&self) -> &UserRef {
        &self.bot_user
    }
}
