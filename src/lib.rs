//! Channel Sweep
//!
//! A moderation utility that bulk-processes the message history of a
//! channel on a Discord-style chat platform: it walks paginated
//! history, filters messages by author and time bounds, applies a
//! destructive or collecting side effect to each matching message, and
//! records run statistics.
//!
//! # Overview
//!
//! - **Traversal**: iterative cursor-driven pagination with a fixed
//!   politeness delay between fetches
//! - **Effects**: delete messages, archive custom emojis, or both,
//!   with collection always running before deletion
//! - **Confirmation**: every run is gated behind an explicit
//!   propose/accept protocol with a 60 second timeout
//! - **Jobs**: declaratively queued runs validated and executed in
//!   sequence
//! - **Analytics**: one persisted record per run with loop, fetch and
//!   validity counters
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use channel_sweep::client::RestChatClient;
//! use channel_sweep::config::Config;
//! use channel_sweep::ops::BulkOps;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!     let token = config.platform.resolve_token()?;
//!     let client = RestChatClient::connect(&config.platform.api_base, &token).await?;
//!     let ops = BulkOps::new(Arc::new(client), config);
//!     // drive ops.run_bulk_operation(..) / ops.run_job_queue(..)
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`analytics`] - per-run records and the shared analytics document
//! - [`bounds`] - range-boundary validation
//! - [`cli`] - command-line interface
//! - [`client`] - platform client trait and REST implementation
//! - [`config`] - configuration management
//! - [`confirm`] - confirmation gate
//! - [`effects`] - per-message side effects and emoji collection
//! - [`error`] - error types and result alias
//! - [`jobs`] - declarative job queue and validation
//! - [`notify`] - fire-and-forget notification sink
//! - [`ops`] - the two bulk-operation entry points
//! - [`pacing`] - fixed-interval request pacing
//! - [`snowflake`] - time-ordered identifiers
//! - [`store`] - whole-document JSON stores
//! - [`traversal`] - the paginating traversal engine

pub mod analytics;
pub mod bounds;
pub mod cli;
pub mod client;
pub mod config;
pub mod confirm;
pub mod effects;
pub mod error;
pub mod jobs;
pub mod models;
pub mod notify;
pub mod ops;
pub mod pacing;
pub mod snowflake;
pub mod store;
pub mod traversal;

// Re-export commonly used types for convenience
pub use error::{Result, SweepError};

// Core data models
pub use models::{ChannelMessage, Effect, EmojiRecord, RunParameters, UserRef};

// Client seam
pub use client::{ChatClient, Cursor, DeleteOutcome, RestChatClient};

// Engine types
pub use analytics::RunRecord;
pub use traversal::TraversalEngine;

// Confirmation gate
pub use confirm::{ConfirmationGate, GateOutcome, PromptSurface};

// Entry points
pub use ops::{BulkOps, JobQueueOutcome, RunOutcome};

// Identifiers
pub use snowflake::Snowflake;
