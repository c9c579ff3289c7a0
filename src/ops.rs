//! Bulk operation entry points
//!
//! The two operations exposed to the command layer: a single gated run
//! over one channel, and the sequential job-queue runner. Everything a
//! run needs (client, pacing, analytics, emoji archive, notification
//! sink, confirmation gate) is owned here and threaded through.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analytics::{AnalyticsRecorder, RunRecord};
use crate::bounds::{self, describe_bounds};
use crate::client::ChatClient;
use crate::config::Config;
use crate::confirm::{ConfirmationGate, GateOutcome, PromptSurface};
use crate::effects::{EmojiCollector, MessageEffect, SideEffects};
use crate::error::Result;
use crate::jobs::{validate_queue, JobAssessment, JobQueue};
use crate::models::{ChannelInfo, RunParameters, UserRef};
use crate::notify::Notifier;
use crate::pacing::RequestPacer;
use crate::store::{AnalyticsDoc, EmojiDoc, JsonStore};
use crate::traversal::TraversalEngine;

/// Terminal state of one bulk run; every variant maps to exactly one
/// final status line for the caller
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunRecord),
    Declined,
    TimedOut,
    /// Validation or permission refusal, before any traversal started
    Refused(String),
    /// Fatal fetch or API error mid-run; the partial record is persisted
    Aborted(String),
}

impl RunOutcome {
    pub fn summary(&self) -> String {
        match self {
            RunOutcome::Completed(record) => format!(
                "done, processed {} {} and attempted to handle {} in {}",
                record.fetched,
                plural(record.fetched, "message", "messages"),
                record.valid,
                record.duration.as_deref().unwrap_or("0s")
            ),
            RunOutcome::Declined => "okay, cancelled".to_string(),
            RunOutcome::TimedOut => "didn't confirm within 1 minute, cancelled".to_string(),
            RunOutcome::Refused(reason) => reason.clone(),
            RunOutcome::Aborted(reason) => format!("run aborted: {}", reason),
        }
    }
}

/// Terminal state of a job-queue invocation
#[derive(Debug, PartialEq, Eq)]
pub enum JobQueueOutcome {
    AlreadyRunning,
    Empty,
    NoValidJobs { invalid: usize },
    Declined,
    TimedOut,
    Finished { executed: usize, skipped: usize },
}

impl JobQueueOutcome {
    pub fn summary(&self) -> String {
        match self {
            JobQueueOutcome::AlreadyRunning => "jobs are already in progress".to_string(),
            JobQueueOutcome::Empty => "no pending jobs to start".to_string(),
            JobQueueOutcome::NoValidJobs { invalid } => format!(
                "no valid jobs to start, skipped {} invalid {}",
                invalid,
                plural(*invalid as u64, "job", "jobs")
            ),
            JobQueueOutcome::Declined => "okay, cancelled".to_string(),
            JobQueueOutcome::TimedOut => {
                "didn't confirm within 1 minute, cancelled".to_string()
            }
            JobQueueOutcome::Finished { executed, skipped } => format!(
                "finished the job queue, ran {} {} and skipped {}",
                executed,
                plural(*executed as u64, "job", "jobs"),
                skipped
            ),
        }
    }
}

fn plural<'a>(count: u64, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 {
        one
    } else {
        many
    }
}

/// Releases the job-runner claim on every exit path
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owner of everything a bulk run needs
pub struct BulkOps {
    client: Arc<dyn ChatClient>,
    config: Config,
    engine: TraversalEngine,
    analytics_store: JsonStore<AnalyticsDoc>,
    analytics: AnalyticsRecorder,
    emoji_store: JsonStore<EmojiDoc>,
    job_store: JsonStore<JobQueue>,
    notifier: Option<Notifier>,
    gate: ConfirmationGate,
    jobs_running: AtomicBool,
}

impl BulkOps {
    pub fn new(client: Arc<dyn ChatClient>, config: Config) -> Self {
        let engine = TraversalEngine::new(
            Arc::clone(&client),
            config.traversal.page_size,
            RequestPacer::from_millis(config.traversal.fetch_interval_ms),
        );
        let analytics_store: JsonStore<AnalyticsDoc> =
            JsonStore::new(config.storage.analytics_path());
        let analytics = AnalyticsRecorder::new(analytics_store.clone());
        let emoji_store = JsonStore::new(config.storage.emojis_path());
        let job_store = JsonStore::new(config.storage.jobs_path());
        let notifier = config
            .platform
            .webhook_url
            .as_deref()
            .map(Notifier::new);
        let gate = ConfirmationGate::new(Duration::from_secs(
            config.traversal.confirm_timeout_secs,
        ));
        Self {
            client,
            config,
            engine,
            analytics_store,
            analytics,
            emoji_store,
            job_store,
            notifier,
            gate,
            jobs_running: AtomicBool::new(false),
        }
    }

    /// Validate, gate, and execute one run over a channel
    pub async fn run_bulk_operation(
        &self,
        params: RunParameters,
        surface: &dyn PromptSurface,
    ) -> Result<RunOutcome> {
        // caller mistakes are reported before any traversal starts
        if let Err(e) = bounds::validate(&params) {
            debug!(
                "{} supplied rejected parameters: {}",
                params.authorizer.describe(),
                e
            );
            return Ok(RunOutcome::Refused(e.to_string()));
        }
        if params.effect.collects() && !self.config.collection.save_emojis {
            return Ok(RunOutcome::Refused(
                "unable to proceed, saving emojis is disabled".to_string(),
            ));
        }

        let Some(channel) = self.client.resolve_channel(params.channel_id).await? else {
            return Ok(RunOutcome::Refused(format!(
                "channel {} is unavailable, can't proceed",
                params.channel_id
            )));
        };
        if channel.guild.is_none() {
            return Ok(RunOutcome::Refused(
                "this command may only be used on guild channels".to_string(),
            ));
        }
        if !self
            .client
            .can_manage_messages(params.channel_id, params.authorizer.id)
            .await?
        {
            debug!(
                "{} lacks Manage Messages in {}",
                params.authorizer.describe(),
                channel.describe()
            );
            return Ok(RunOutcome::Refused(format!(
                "you don't have permission to do this in #{}",
                channel.name
            )));
        }
        let bot = self.client.current_user();
        if !self
            .client
            .can_manage_messages(params.channel_id, bot.id)
            .await?
        {
            return Ok(RunOutcome::Refused(format!(
                "{} is missing Manage Messages in #{}, can't proceed",
                bot.tag, channel.name
            )));
        }

        match self
            .gate
            .confirm(surface, &params.authorizer, &propose(&params, &channel))
            .await?
        {
            GateOutcome::Declined => return Ok(RunOutcome::Declined),
            GateOutcome::TimedOut => return Ok(RunOutcome::TimedOut),
            GateOutcome::Confirmed(prompt) => {
                surface
                    .finalize(prompt, &confirmed_followup(&params, &channel))
                    .await?;
            }
        }

        self.execute(&params, &channel).await
    }

    /// Load, validate, gate and run the queued jobs in order
    pub async fn run_job_queue(
        &self,
        authorizer: &UserRef,
        surface: &dyn PromptSurface,
    ) -> Result<JobQueueOutcome> {
        // a second start is rejected outright, before the queue is even
        // loaded
        if self.jobs_running.load(Ordering::Acquire) {
            return Ok(JobQueueOutcome::AlreadyRunning);
        }

        let queue = self.job_store.read().await?;
        if queue.pending.is_empty() {
            return Ok(JobQueueOutcome::Empty);
        }
        let assessed = validate_queue(&queue);
        for assessment in &assessed {
            debug!(
                "{} job {}",
                if assessment.valid { "valid" } else { "invalid" },
                assessment.description
            );
        }
        let valid_count = assessed.iter().filter(|a| a.valid).count();
        let invalid_count = assessed.len() - valid_count;
        if valid_count == 0 {
            return Ok(JobQueueOutcome::NoValidJobs {
                invalid: invalid_count,
            });
        }

        let description = format!(
            "are you sure you wish to run {} queued {}, excluding {} invalid {}?",
            valid_count,
            plural(valid_count as u64, "job", "jobs"),
            invalid_count,
            plural(invalid_count as u64, "job", "jobs")
        );
        match self.gate.confirm(surface, authorizer, &description).await? {
            GateOutcome::Declined => return Ok(JobQueueOutcome::Declined),
            GateOutcome::TimedOut => return Ok(JobQueueOutcome::TimedOut),
            GateOutcome::Confirmed(prompt) => {
                surface
                    .finalize(
                        prompt,
                        &format!(
                            "confirmed, starting to iterate over {} jobs",
                            valid_count
                        ),
                    )
                    .await?;
            }
        }

        if self
            .jobs_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(JobQueueOutcome::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.jobs_running);
        info!(
            "{} authorized iterating over {} jobs",
            authorizer.describe(),
            valid_count
        );

        let job_delay = Duration::from_millis(self.config.traversal.job_interval_ms);
        let mut executed = 0;
        let mut skipped = 0;
        for assessment in &assessed {
            let Some(job) = assessment.parsed.as_ref() else {
                continue;
            };
            let index = assessment.index;

            if job.save && !self.config.collection.save_emojis {
                debug!("skipping job {}, saving isn't explicitly enabled", index);
                skipped += 1;
                continue;
            }
            tokio::time::sleep(job_delay).await;

            // the channel may have gone away since validation; that
            // skips the job, never the whole queue
            let channel = match self.client.resolve_channel(job.channel).await {
                Ok(Some(channel)) => channel,
                Ok(None) => {
                    debug!("skipping job {}, unresolved channel", index);
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("skipping job {}, channel lookup failed: {}", index, e);
                    skipped += 1;
                    continue;
                }
            };
            let Some(guild) = channel.guild.clone() else {
                debug!("skipping job {}, channel has no guild", index);
                skipped += 1;
                continue;
            };
            if job.clear {
                let resolvable = match job.user {
                    Some(user_id) => matches!(
                        self.client.resolve_member(guild.id, user_id).await,
                        Ok(Some(_))
                    ),
                    None => false,
                };
                if !resolvable {
                    debug!("skipping clearing job {}, unresolved user", index);
                    skipped += 1;
                    continue;
                }
            }

            let params = RunParameters {
                channel_id: job.channel,
                user_id: job.user,
                before: job.before,
                after: job.after,
                effect: job.effect(),
                authorizer: authorizer.clone(),
            };
            match self.execute(&params, &channel).await {
                Ok(RunOutcome::Completed(record)) => {
                    info!(
                        "job {} finished, processed {} and handled {}",
                        index, record.fetched, record.valid
                    );
                    executed += 1;
                }
                Ok(outcome) => {
                    warn!("job {} did not complete: {}", index, outcome.summary());
                    skipped += 1;
                }
                Err(e) => {
                    warn!("job {} failed: {}", index, e);
                    skipped += 1;
                }
            }
        }

        Ok(JobQueueOutcome::Finished { executed, skipped })
    }

    /// Validate and describe the queued jobs without running anything
    pub async fn list_jobs(&self) -> Result<Vec<JobAssessment>> {
        let queue = self.job_store.read().await?;
        Ok(validate_queue(&queue))
    }

    /// Most recent run records, newest first
    pub async fn recent_runs(&self, limit: usize) -> Result<Vec<(String, RunRecord)>> {
        let doc = self.analytics_store.read().await?;
        let mut runs: Vec<_> = doc.into_iter().collect();
        runs.sort_by_key(|(id, _)| id.parse::<u64>().unwrap_or(0));
        runs.reverse();
        runs.truncate(limit);
        Ok(runs)
    }

    /// The post-gate run itself: open the record, traverse, persist
    async fn execute(&self, params: &RunParameters, channel: &ChannelInfo) -> Result<RunOutcome> {
        let filter = match (params.user_id, &channel.guild) {
            (Some(user_id), Some(guild)) => Some(
                match self.client.resolve_member(guild.id, user_id).await {
                    Ok(Some(member)) => member.user.describe(),
                    _ => user_id.to_string(),
                },
            ),
            (Some(user_id), None) => Some(user_id.to_string()),
            (None, _) => None,
        };

        let mut record = RunRecord::new(params, channel, filter);
        let run_id = self.analytics.open_run(&record).await?;
        if let Some(notifier) = &self.notifier {
            notifier
                .send(&format!(
                    "run {} starting in {} ({})",
                    run_id,
                    channel.describe(),
                    params.effect.describe()
                ))
                .await;
        }

        let collector = if params.effect.collects() {
            Some(
                EmojiCollector::open(
                    self.emoji_store.clone(),
                    self.config.collection.write_through,
                )
                .await?,
            )
        } else {
            None
        };
        let mut effects = SideEffects::new(
            params.effect,
            Arc::clone(&self.client),
            RequestPacer::from_millis(self.config.traversal.delete_interval_ms),
            collector,
        )?;

        let result = self.engine.run(&run_id, params, &mut effects, &mut record).await;
        effects.finish().await?;

        match result {
            Ok(()) => {
                self.analytics.update_run(&run_id, &record).await?;
                if let Some(notifier) = &self.notifier {
                    notifier
                        .send(&format!(
                            "run {} finished: {} fetched, {} valid, {} deleted",
                            run_id, record.fetched, record.valid, record.deleted
                        ))
                        .await;
                }
                Ok(RunOutcome::Completed(record))
            }
            Err(e) => {
                // persist the partial record before reporting the failure
                self.analytics.update_run(&run_id, &record).await?;
                if let Some(notifier) = &self.notifier {
                    notifier
                        .send(&format!("run {} aborted: {}", run_id, e))
                        .await;
                }
                Ok(RunOutcome::Aborted(e.to_string()))
            }
        }
    }
}

fn propose(params: &RunParameters, channel: &ChannelInfo) -> String {
    let scope = if params.before.is_some() || params.after.is_some() {
        "some"
    } else {
        "all"
    };
    let bounds = describe_bounds(params.before, params.after);
    let bounds = if bounds.is_empty() {
        bounds
    } else {
        format!(" {}", bounds)
    };
    let source = match params.user_id {
        Some(user_id) => format!("from user {} in #{}", user_id, channel.name),
        None => format!("from #{}", channel.name),
    };
    if params.effect.deletes() {
        format!(
            "are you sure you wish to delete {} messages {}{}?",
            scope, source, bounds
        )
    } else {
        format!(
            "are you sure you wish to collect {} emojis {}{}?",
            scope, source, bounds
        )
    }
}

fn confirmed_followup(params: &RunParameters, channel: &ChannelInfo) -> String {
    let verb = match params.effect {
        crate::models::Effect::Delete => "deleting messages",
        crate::models::Effect::Collect => "collecting emojis",
        crate::models::Effect::DeleteAndCollect => "deleting messages and collecting emojis",
    };
    format!("confirmed, {} in #{}", verb, channel.name)
}
