//! Confirmation gate for destructive runs
//!
//! A propose/accept/reject/timeout protocol layered on an interactive
//! prompt-with-buttons surface. The gate never starts the underlying
//! run; it only hands a decision back to the caller.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::models::UserRef;
use crate::snowflake::Snowflake;

/// Handle to a prompt previously presented on a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptId(pub u64);

/// One of the two mutually exclusive prompt controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Yes,
    No,
}

/// Terminal state of a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// The requester pressed Yes; the caller performs its own follow-up
    /// edit on the prompt
    Confirmed(PromptId),
    Declined,
    TimedOut,
}

impl GateOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, GateOutcome::Confirmed(_))
    }
}

/// Interactive prompt mechanism the gate is layered on
///
/// Implementations must restrict `await_choice` to activations by the
/// given requester and must consume the controls once a choice is
/// returned, so a duplicate activation cannot re-trigger anything.
#[async_trait]
pub trait PromptSurface: Send + Sync {
    /// Send the description with affirm/decline controls attached
    async fn present(&self, description: &str) -> Result<PromptId>;

    /// Await exactly one control activation by `requester`, or `None`
    /// when the timeout elapses first
    async fn await_choice(
        &self,
        prompt: PromptId,
        requester: Snowflake,
        timeout: Duration,
    ) -> Result<Option<Choice>>;

    /// Replace the prompt content and strip its controls
    async fn finalize(&self, prompt: PromptId, text: &str) -> Result<()>;
}

/// The gate itself; holds only the configured timeout
pub struct ConfirmationGate {
    timeout: Duration,
}

impl ConfirmationGate {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Propose `description` to `requester` and await their decision
    ///
    /// On timeout or decline the prompt is edited to its terminal
    /// outcome exactly once and the run must not start.
    pub async fn confirm(
        &self,
        surface: &dyn PromptSurface,
        requester: &UserRef,
        description: &str,
    ) -> Result<GateOutcome> {
        let prompt = surface.present(description).await?;
        match surface
            .await_choice(prompt, requester.id, self.timeout)
            .await?
        {
            None => {
                debug!(
                    "{} didn't confirm within {} seconds, cancelled",
                    requester.describe(),
                    self.timeout.as_secs()
                );
                surface
                    .finalize(prompt, "didn't confirm within 1 minute, cancelled")
                    .await?;
                Ok(GateOutcome::TimedOut)
            }
            Some(Choice::No) => {
                surface.finalize(prompt, "okay, cancelled").await?;
                Ok(GateOutcome::Declined)
            }
            Some(Choice::Yes) => Ok(GateOutcome::Confirmed(prompt)),
        }
    }
}
