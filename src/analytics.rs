//! Per-run analytics records
//!
//! One record per run, keyed by a freshly generated snowflake id inside
//! a single shared document. Records are written at run start and run
//! end, mutated only by the run that owns them, and never touched again
//! once `end` is set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::models::{ChannelInfo, RunParameters};
use crate::snowflake::Snowflake;
use crate::store::{AnalyticsDoc, JsonStore};

/// Persisted statistics for one traversal run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Who authorized the run, "tag (id)"
    pub authorization: String,
    /// Author filter if one was applied, "tag (id)" or a bare id
    pub filter: Option<String>,
    /// Target channel, "#name (id) in guild (id)"
    pub channel: String,
    pub before: Option<Snowflake>,
    pub after: Option<Snowflake>,
    /// Number of fetch calls made
    pub loops: u64,
    /// Messages fetched, counting every raw page in full
    pub fetched: u64,
    /// Messages that passed the filter and bounds
    pub valid: u64,
    /// Messages actually deleted
    pub deleted: u64,
    /// Messages the platform reported as not deletable
    pub skipped: u64,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub duration: Option<String>,
}

impl RunRecord {
    pub fn new(params: &RunParameters, channel: &ChannelInfo, filter: Option<String>) -> Self {
        Self {
            authorization: params.authorizer.describe(),
            filter,
            channel: channel.describe(),
            before: params.before,
            after: params.after,
            loops: 0,
            fetched: 0,
            valid: 0,
            deleted: 0,
            skipped: 0,
            start: Utc::now(),
            end: None,
            duration: None,
        }
    }

    /// Stamp the end time and derived duration; a record is never
    /// mutated again after this
    pub fn finalize(&mut self) {
        let end = Utc::now();
        self.duration = Some(human_duration(end - self.start));
        self.end = Some(end);
    }
}

/// Append-only writer for the shared analytics document
#[derive(Clone)]
pub struct AnalyticsRecorder {
    store: JsonStore<AnalyticsDoc>,
}

impl AnalyticsRecorder {
    pub fn new(store: JsonStore<AnalyticsDoc>) -> Self {
        Self { store }
    }

    /// Persist the opening state of a run under a fresh id
    pub async fn open_run(&self, record: &RunRecord) -> Result<String> {
        let id = Snowflake::generate().to_string();
        let mut doc = self.store.read().await?;
        doc.insert(id.clone(), record.clone());
        self.store.write(&doc).await?;
        debug!("[run {}] opened analytics record for {}", id, record.channel);
        Ok(id)
    }

    /// Write back the current state of a run's record
    pub async fn update_run(&self, id: &str, record: &RunRecord) -> Result<()> {
        let mut doc = self.store.read().await?;
        doc.insert(id.to_string(), record.clone());
        self.store.write(&doc).await
    }
}

/// Render a duration the way a human would say it, e.g. "2m 5s"
pub fn human_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Effect, GuildRef, UserRef};
    use tempfile::TempDir;

    fn sample_record() -> RunRecord {
        let params = RunParameters {
            channel_id: Snowflake::from_raw(81384788765712384),
            user_id: None,
            before: None,
            after: None,
            effect: Effect::Collect,
            authorizer: UserRef::new(Snowflake::from_raw(175928847299117063), "mod#0001"),
        };
        let channel = ChannelInfo {
            id: Snowflake::from_raw(81384788765712384),
            name: "general".to_string(),
            guild: Some(GuildRef {
                id: Snowflake::from_raw(81384788765712385),
                name: "testers".to_string(),
            }),
        };
        RunRecord::new(&params, &channel, None)
    }

    #[test]
    fn test_new_record_starts_zeroed() {
        let record = sample_record();
        assert_eq!(record.loops, 0);
        assert_eq!(record.fetched, 0);
        assert_eq!(record.valid, 0);
        assert!(record.end.is_none());
        assert!(record.duration.is_none());
        assert!(record.authorization.contains("mod#0001"));
    }

    #[test]
    fn test_finalize_stamps_end_and_duration() {
        let mut record = sample_record();
        record.finalize();
        assert!(record.end.is_some());
        assert!(record.duration.is_some());
        assert!(record.end.unwrap() >= record.start);
    }

    #[test]
    fn test_human_duration() {
        assert_eq!(human_duration(chrono::Duration::seconds(5)), "5s");
        assert_eq!(human_duration(chrono::Duration::seconds(125)), "2m 5s");
        assert_eq!(human_duration(chrono::Duration::seconds(3725)), "1h 2m 5s");
        assert_eq!(human_duration(chrono::Duration::seconds(-3)), "0s");
    }

    #[tokio::test]
    async fn test_open_and_update_run() {
        let dir = TempDir::new().unwrap();
        let recorder =
            AnalyticsRecorder::new(JsonStore::new(dir.path().join("analytics.json")));

        let mut record = sample_record();
        let id = recorder.open_run(&record).await.unwrap();

        record.loops = 3;
        record.fetched = 250;
        record.valid = 42;
        record.finalize();
        recorder.update_run(&id, &record).await.unwrap();

        let doc = JsonStore::<AnalyticsDoc>::new(dir.path().join("analytics.json"))
            .read()
            .await
            .unwrap();
        assert_eq!(doc.len(), 1);
        let stored = doc.get(&id).unwrap();
        assert_eq!(stored.loops, 3);
        assert_eq!(stored.fetched, 250);
        assert!(stored.end.is_some());
    }

    #[tokio::test]
    async fn test_runs_accumulate_under_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let recorder =
            AnalyticsRecorder::new(JsonStore::new(dir.path().join("analytics.json")));

        let first = recorder.open_run(&sample_record()).await.unwrap();
        let second = recorder.open_run(&sample_record()).await.unwrap();
        assert_ne!(first, second);

        let doc = JsonStore::<AnalyticsDoc>::new(dir.path().join("analytics.json"))
            .read()
            .await
            .unwrap();
        assert_eq!(doc.len(), 2);
    }
}
