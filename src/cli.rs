//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::bounds::parse_bound;
use crate::client::{ChatClient, RestChatClient};
use crate::config::Config;
use crate::confirm::{Choice, PromptId, PromptSurface};
use crate::error::Result;
use crate::models::{Effect, RunParameters, UserRef};
use crate::ops::{BulkOps, JobQueueOutcome, RunOutcome};
use crate::snowflake::Snowflake;

#[derive(Parser, Debug)]
#[command(name = "channel-sweep")]
#[command(version)]
#[command(about = "Bulk channel history moderation", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one bulk operation over a channel
    Run {
        /// Target channel id
        channel: String,

        /// Only touch messages by this user id
        #[arg(short, long)]
        user: Option<String>,

        /// Upper boundary message id; traversal starts just below it
        #[arg(long)]
        before: Option<String>,

        /// Lower boundary message id; traversal stops once it is reached
        #[arg(long)]
        after: Option<String>,

        /// Delete matching messages
        #[arg(long)]
        delete: bool,

        /// Collect custom emojis from matching messages
        #[arg(long)]
        collect: bool,
    },

    /// Inspect or run the queued jobs
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },

    /// Show recent run records
    Status {
        /// How many runs to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Generate an example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobsAction {
    /// Validate and print every queued job
    List,
    /// Run the valid queued jobs in order
    Start,
}

/// Terminal implementation of the confirmation surface
///
/// Presents the proposal on stdout and reads a single y/N line; silence
/// past the timeout counts as no answer, exactly like an unanswered
/// prompt on the chat platform.
pub struct TerminalPrompt;

#[async_trait::async_trait]
impl PromptSurface for TerminalPrompt {
    async fn present(&self, description: &str) -> Result<PromptId> {
        println!("{} [y/N]", description);
        Ok(PromptId(0))
    }

    async fn await_choice(
        &self,
        _prompt: PromptId,
        _requester: Snowflake,
        timeout: Duration,
    ) -> Result<Option<Choice>> {
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        match tokio::time::timeout(timeout, reader.read_line(&mut line)).await {
            Err(_) => Ok(None),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(_)) => {
                let answer = line.trim();
                if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
                    Ok(Some(Choice::Yes))
                } else {
                    Ok(Some(Choice::No))
                }
            }
        }
    }

    async fn finalize(&self, _prompt: PromptId, text: &str) -> Result<()> {
        println!("{}", text);
        Ok(())
    }
}

/// Dispatch a parsed command line; returns the process exit code
pub async fn execute(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::InitConfig { output, force } => init_config(&output, force).await,
        Commands::Run {
            channel,
            user,
            before,
            after,
            delete,
            collect,
        } => {
            let (ops, authorizer) = connect(&cli.config).await?;
            run_bulk(&ops, authorizer, &channel, user, before, after, delete, collect).await
        }
        Commands::Jobs { action } => {
            let (ops, authorizer) = connect(&cli.config).await?;
            match action {
                JobsAction::List => list_jobs(&ops).await,
                JobsAction::Start => start_jobs(&ops, authorizer).await,
            }
        }
        Commands::Status { limit } => {
            let (ops, _) = connect(&cli.config).await?;
            status(&ops, limit).await
        }
    }
}

async fn connect(config_path: &Path) -> anyhow::Result<(BulkOps, UserRef)> {
    let config = Config::load(config_path).await?;
    let token = config.platform.resolve_token()?;
    let client = RestChatClient::connect(&config.platform.api_base, &token).await?;
    let authorizer = client.current_user().clone();
    info!("operating as {}", authorizer.describe());
    Ok((BulkOps::new(Arc::new(client), config), authorizer))
}

#[allow(clippy::too_many_arguments)]
async fn run_bulk(
    ops: &BulkOps,
    authorizer: UserRef,
    channel: &str,
    user: Option<String>,
    before: Option<String>,
    after: Option<String>,
    delete: bool,
    collect: bool,
) -> anyhow::Result<i32> {
    let effect = match (delete, collect) {
        (true, true) => Effect::DeleteAndCollect,
        (true, false) => Effect::Delete,
        (false, true) => Effect::Collect,
        (false, false) => {
            anyhow::bail!("nothing to do: pass --delete and/or --collect")
        }
    };
    let params = RunParameters {
        channel_id: channel
            .parse()
            .map_err(|e| anyhow::anyhow!("channel: {}", e))?,
        user_id: match user.as_deref() {
            Some(raw) => Some(raw.parse().map_err(|e| anyhow::anyhow!("user: {}", e))?),
            None => None,
        },
        before: parse_bound(before.as_deref(), "before")?,
        after: parse_bound(after.as_deref(), "after")?,
        effect,
        authorizer,
    };

    let outcome = ops.run_bulk_operation(params, &TerminalPrompt).await?;
    println!("{}", outcome.summary());
    Ok(match outcome {
        RunOutcome::Completed(_) | RunOutcome::Declined | RunOutcome::TimedOut => 0,
        RunOutcome::Refused(_) | RunOutcome::Aborted(_) => 1,
    })
}

async fn list_jobs(ops: &BulkOps) -> anyhow::Result<i32> {
    let assessed = ops.list_jobs().await?;
    if assessed.is_empty() {
        println!("no pending jobs");
        return Ok(0);
    }
    for assessment in &assessed {
        let marker = if assessment.valid { "ok " } else { "BAD" };
        println!("{} {}", marker, assessment.description);
    }
    Ok(0)
}

async fn start_jobs(ops: &BulkOps, authorizer: UserRef) -> anyhow::Result<i32> {
    let outcome = ops.run_job_queue(&authorizer, &TerminalPrompt).await?;
    println!("{}", outcome.summary());
    Ok(match outcome {
        JobQueueOutcome::Finished { .. }
        | JobQueueOutcome::Empty
        | JobQueueOutcome::Declined
        | JobQueueOutcome::TimedOut => 0,
        JobQueueOutcome::AlreadyRunning | JobQueueOutcome::NoValidJobs { .. } => 1,
    })
}

async fn status(ops: &BulkOps, limit: usize) -> anyhow::Result<i32> {
    let runs = ops.recent_runs(limit).await?;
    if runs.is_empty() {
        println!("no recorded runs");
        return Ok(0);
    }
    for (id, record) in &runs {
        let state = match &record.duration {
            Some(duration) => format!("finished in {}", duration),
            None => "incomplete".to_string(),
        };
        println!(
            "{}  {}  loops {}  fetched {}  valid {}  deleted {}  skipped {}  {}",
            id,
            record.channel,
            record.loops,
            record.fetched,
            record.valid,
            record.deleted,
            record.skipped,
            state
        );
    }
    Ok(0)
}

async fn init_config(output: &Path, force: bool) -> anyhow::Result<i32> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite",
            output.display()
        );
    }
    tokio::fs::write(output, Config::example_toml()).await?;
    println!("wrote {}", output.display());
    Ok(0)
}
