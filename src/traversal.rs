//! Paginating channel-history traversal
//!
//! The central state machine: repeatedly fetch bounded pages of history,
//! filter them, hand each valid message to the side-effect pipeline, and
//! keep the run's counters current. A run ends on natural exhaustion (a
//! short page), on reaching the lower boundary in combined-range mode,
//! or on a fetch error, which is fatal and never retried.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::analytics::RunRecord;
use crate::client::{ChatClient, Cursor};
use crate::effects::MessageEffect;
use crate::error::Result;
use crate::models::{ChannelMessage, RunParameters};
use crate::pacing::RequestPacer;
use crate::snowflake::Snowflake;

/// Which way the cursor walks through history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Walk toward older messages via `before`
    Backward,
    /// Walk toward newer messages via `after`
    Forward,
}

/// Mutable state owned by exactly one in-flight run
#[derive(Debug)]
struct TraversalState {
    direction: Direction,
    cursor: Option<Snowflake>,
    stop_after_page: bool,
    active: bool,
}

impl TraversalState {
    /// `before` takes precedence when both bounds are supplied
    fn new(params: &RunParameters) -> Self {
        let (direction, cursor) = if params.before.is_some() || params.after.is_none() {
            (Direction::Backward, params.before)
        } else {
            (Direction::Forward, params.after)
        };
        Self {
            direction,
            cursor,
            stop_after_page: false,
            active: true,
        }
    }

    fn cursor(&self) -> Option<Cursor> {
        match self.direction {
            Direction::Backward => self.cursor.map(Cursor::Before),
            Direction::Forward => self.cursor.map(Cursor::After),
        }
    }

    /// Backward runs continue below the oldest id seen, forward runs
    /// above the newest
    fn advance(&mut self, page: &[ChannelMessage]) {
        let next = match self.direction {
            Direction::Backward => page.iter().map(|m| m.id).min(),
            Direction::Forward => page.iter().map(|m| m.id).max(),
        };
        if next.is_some() {
            self.cursor = next;
        }
    }
}

/// Drives one run's fetch loop
pub struct TraversalEngine {
    client: Arc<dyn ChatClient>,
    fetch_pacer: RequestPacer,
    page_size: usize,
}

impl TraversalEngine {
    pub fn new(client: Arc<dyn ChatClient>, page_size: usize, fetch_pacer: RequestPacer) -> Self {
        Self {
            client,
            fetch_pacer,
            page_size,
        }
    }

    /// Walk the channel, applying `effects` to every valid message and
    /// keeping `record` current
    ///
    /// On success the record is finalized. On a fetch error the record
    /// is left partial (no `end`) and the error is returned; the caller
    /// persists what there is and reports the failure.
    pub async fn run(
        &self,
        run_id: &str,
        params: &RunParameters,
        effects: &mut dyn MessageEffect,
        record: &mut RunRecord,
    ) -> Result<()> {
        let combined = params.before.is_some() && params.after.is_some();
        let mut state = TraversalState::new(params);
        info!(
            "[run {}] starting traversal of channel {}",
            run_id, params.channel_id
        );

        while state.active {
            self.fetch_pacer.pace().await;
            record.loops += 1;
            let page = match self
                .client
                .fetch_page(params.channel_id, self.page_size, state.cursor())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    error!(
                        "[run {}] fetch failed on loop {}: {}",
                        run_id, record.loops, e
                    );
                    return Err(e);
                }
            };
            record.fetched += page.len() as u64;

            let mut valid: Vec<&ChannelMessage> = match params.user_id {
                Some(user_id) => page.iter().filter(|m| m.author.id == user_id).collect(),
                None => page.iter().collect(),
            };

            // combined-range mode: pages walk down via `before`; once the
            // `after` boundary shows up, sweep it and everything at or
            // below its creation time out of the page, finish replaying
            // the remainder, then stop
            if combined {
                if let Some(boundary) = page.iter().find(|m| Some(m.id) == params.after) {
                    let cutoff = boundary.id.timestamp_ms();
                    valid.retain(|m| m.id.timestamp_ms() > cutoff);
                    state.stop_after_page = true;
                    debug!(
                        "[run {}] reached lower boundary {}, finishing this page",
                        run_id, boundary.id
                    );
                }
            }
            record.valid += valid.len() as u64;

            for message in &valid {
                let report = effects.apply(message).await?;
                if report.deleted {
                    record.deleted += 1;
                }
                if report.skipped {
                    record.skipped += 1;
                }
            }

            debug!(
                "[run {}] [{} pages deep] {} of {} messages were valid, for a total of {} out of {}",
                run_id,
                record.loops,
                valid.len(),
                page.len(),
                record.valid,
                record.fetched
            );

            state.advance(&page);
            // a short page is the exhaustion signal; there is no
            // explicit "no more pages" flag from the platform
            if state.stop_after_page || page.len() < self.page_size {
                state.active = false;
            }
        }

        record.finalize();
        info!(
            "[run {}] finished, processed {} messages and handled {} in {}",
            run_id,
            record.fetched,
            record.valid,
            record.duration.as_deref().unwrap_or("0s")
        );
        Ok(())
    }
}
