//! Declarative job queue
//!
//! Jobs are deferred run definitions read from the job-queue document.
//! Validation is pure and deterministic: no platform calls, no
//! mutation, one distinct human-readable reason per way a job can be
//! wrong. Queue consumption is at-most-once per process invocation;
//! the document is never written back.

use serde::{Deserialize, Serialize};

use crate::bounds::describe_bounds;
use crate::models::Effect;
use crate::snowflake::Snowflake;

/// One entry of the queue document, as written by an operator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    /// Purposefully ignored; lets queue authors annotate entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub clear: bool,
    #[serde(default)]
    pub save: bool,
}

/// The queue document; a missing `pending` list reads as empty
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobQueue {
    #[serde(default)]
    pub pending: Vec<Job>,
}

/// A job whose references all parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedJob {
    pub channel: Snowflake,
    pub user: Option<Snowflake>,
    pub before: Option<Snowflake>,
    pub after: Option<Snowflake>,
    pub clear: bool,
    pub save: bool,
}

impl ParsedJob {
    pub fn effect(&self) -> Effect {
        match (self.clear, self.save) {
            (true, true) => Effect::DeleteAndCollect,
            (true, false) => Effect::Delete,
            _ => Effect::Collect,
        }
    }
}

/// Validation verdict plus the audit line shown for this job
#[derive(Debug, Clone)]
pub struct JobAssessment {
    pub index: usize,
    pub valid: bool,
    pub description: String,
    pub parsed: Option<ParsedJob>,
}

fn parse_id(raw: &str) -> Option<Snowflake> {
    raw.parse().ok()
}

fn cap_characters(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let capped: String = text.chars().take(limit).collect();
        format!("{}...", capped)
    } else {
        text.to_string()
    }
}

/// Check one job entry; every failure mode gets its own reason
pub fn validate_job(job: &Job, index: usize) -> JobAssessment {
    let invalid = |reason: &str| JobAssessment {
        index,
        valid: false,
        description: format!("{}: {}", index, reason),
        parsed: None,
    };

    let Some(channel_raw) = job.channel.as_deref() else {
        return invalid("missing channel");
    };
    let Some(channel) = parse_id(channel_raw) else {
        return invalid("invalid channel");
    };
    if !job.clear && !job.save {
        return invalid("invalid job type");
    }
    let after = match job.after.as_deref() {
        Some(raw) => match parse_id(raw) {
            Some(id) => Some(id),
            None => return invalid("invalid after"),
        },
        None => None,
    };
    let before = match job.before.as_deref() {
        Some(raw) => match parse_id(raw) {
            Some(id) => Some(id),
            None => return invalid("invalid before"),
        },
        None => None,
    };
    if let (Some(before), Some(after)) = (before, after) {
        if after.timestamp_ms() > before.timestamp_ms() {
            return invalid("after cant be after before");
        }
    }
    if job.clear && job.user.is_none() {
        return invalid("missing user");
    }
    let user = match job.user.as_deref() {
        Some(raw) => match parse_id(raw) {
            Some(id) => Some(id),
            None => return invalid("invalid user"),
        },
        None => None,
    };

    // passed checks
    let mut description = format!("{}: #{}", index, cap_characters(channel_raw, 27));
    if let Some(user) = user {
        description.push_str(&format!(" user {}", user));
    }
    let bounds = describe_bounds(before, after);
    if !bounds.is_empty() {
        description.push(' ');
        description.push_str(&bounds);
    }

    JobAssessment {
        index,
        valid: true,
        description,
        parsed: Some(ParsedJob {
            channel,
            user,
            before,
            after,
            clear: job.clear,
            save: job.save,
        }),
    }
}

/// Validate a whole queue in order
pub fn validate_queue(queue: &JobQueue) -> Vec<JobAssessment> {
    queue
        .pending
        .iter()
        .enumerate()
        .map(|(index, job)| validate_job(job, index))
        .collect()
}
