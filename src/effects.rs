//! Per-message side effects
//!
//! One capability per run, dispatched once per valid message: delete
//! the message, collect custom emojis out of it, or both. When both are
//! requested, collection always runs before deletion so the data exists
//! before the message does not.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::client::{ChatClient, DeleteOutcome};
use crate::error::{Result, SweepError};
use crate::models::{ChannelMessage, Effect, EmojiRecord};
use crate::pacing::RequestPacer;
use crate::snowflake::Snowflake;
use crate::store::{EmojiDoc, JsonStore};

/// Custom-emoji markup inside message text: `<a:name:id>` or `<:name:id>`
static CUSTOM_EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?P<animated>a?):(?P<name>[^:]+):(?P<id>\d{17,20})>").expect("emoji pattern")
});

/// What applying an effect to one message did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectReport {
    pub deleted: bool,
    pub skipped: bool,
    pub new_emojis: usize,
}

/// Per-message capability applied by the traversal engine
#[async_trait]
pub trait MessageEffect: Send {
    async fn apply(&mut self, message: &ChannelMessage) -> Result<EffectReport>;

    /// Called once after the last message of a run
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Deduplicating collector for custom emojis
///
/// Known emoji ids are loaded once at open; a record is written on
/// first sighting and never overwritten.
pub struct EmojiCollector {
    store: JsonStore<EmojiDoc>,
    known: EmojiDoc,
    write_through: bool,
    dirty: bool,
}

impl EmojiCollector {
    pub async fn open(store: JsonStore<EmojiDoc>, write_through: bool) -> Result<Self> {
        let known = store.read().await?;
        Ok(Self {
            store,
            known,
            write_through,
            dirty: false,
        })
    }

    /// Scan message text and live reactions for unseen custom emojis;
    /// returns how many new records were made
    pub async fn collect(&mut self, message: &ChannelMessage) -> Result<usize> {
        let mut new_emojis = 0;
        if !message.content.is_empty() {
            for capture in CUSTOM_EMOJI.captures_iter(&message.content) {
                let id: Snowflake = capture["id"].parse()?;
                let animated = !capture["animated"].is_empty();
                if self.record(id, &capture["name"], animated) {
                    new_emojis += 1;
                }
            }
        } else if message.embed_count == 0 && message.attachment_count == 0 {
            trace!(
                "unable to parse emojis from message {}, empty content with no attachments or embeds? occurred in channel {}",
                message.id,
                message.channel_id
            );
        }
        for reaction in &message.reactions {
            // unicode reactions have no id and are not collectable
            if let Some(id) = reaction.id {
                if self.record(id, &reaction.name, reaction.animated) {
                    new_emojis += 1;
                }
            }
        }
        if new_emojis > 0 {
            debug!("recorded {} new emojis from message {}", new_emojis, message.id);
            if self.write_through {
                self.store.write(&self.known).await?;
                self.dirty = false;
            }
        }
        Ok(new_emojis)
    }

    /// Persist anything still unwritten
    pub async fn flush(&mut self) -> Result<()> {
        if self.dirty {
            self.store.write(&self.known).await?;
            self.dirty = false;
        }
        Ok(())
    }

    fn record(&mut self, id: Snowflake, name: &str, animated: bool) -> bool {
        let key = id.to_string();
        if self.known.contains_key(&key) {
            return false;
        }
        self.known.insert(
            key,
            EmojiRecord {
                id,
                name: name.to_string(),
                animated,
            },
        );
        self.dirty = true;
        true
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }
}

/// Production effect pipeline: optional collection, then optional
/// deletion, each paced independently of history fetches
pub struct SideEffects {
    effect: Effect,
    client: Arc<dyn ChatClient>,
    delete_pacer: RequestPacer,
    collector: Option<EmojiCollector>,
}

impl SideEffects {
    pub fn new(
        effect: Effect,
        client: Arc<dyn ChatClient>,
        delete_pacer: RequestPacer,
        collector: Option<EmojiCollector>,
    ) -> Result<Self> {
        if effect.collects() && collector.is_none() {
            return Err(SweepError::Config(
                "collecting effect requires an emoji collector".to_string(),
            ));
        }
        Ok(Self {
            effect,
            client,
            delete_pacer,
            collector,
        })
    }
}

#[async_trait]
impl MessageEffect for SideEffects {
    async fn apply(&mut self, message: &ChannelMessage) -> Result<EffectReport> {
        let mut report = EffectReport::default();
        if self.effect.collects() {
            if let Some(collector) = &mut self.collector {
                report.new_emojis = collector.collect(message).await?;
            }
        }
        if self.effect.deletes() {
            // deletions are their own rate-limited operation class
            self.delete_pacer.pace().await;
            match self
                .client
                .delete_message(message.channel_id, message.id)
                .await?
            {
                DeleteOutcome::Deleted => report.deleted = true,
                DeleteOutcome::NotDeletable => {
                    debug!("message {} is not deletable, skipping", message.id);
                    report.skipped = true;
                }
            }
        }
        Ok(report)
    }

    async fn finish(&mut self) -> Result<()> {
        if let Some(collector) = &mut self.collector {
            collector.flush().await?;
        }
        Ok(())
    }
}
