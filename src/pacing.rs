//! Fixed-interval pacing for outbound platform requests
//!
//! The platform tolerates roughly one request per second per operation
//! class before rate limiting kicks in. History fetches and deletions
//! are distinct classes and each carries its own pacer, so a run that
//! interleaves them never bursts either class.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Enforces a minimum interval between consecutive calls
///
/// The first call never waits. Clones share the same schedule.
#[derive(Debug)]
pub struct RequestPacer {
    interval: Duration,
    next_ready: Arc<Mutex<Option<Instant>>>,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_ready: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Wait until the configured interval has elapsed since the
    /// previous call, then claim the slot
    pub async fn pace(&self) {
        let wait = {
            let mut next_ready = self.next_ready.lock().await;
            let now = Instant::now();
            let ready = match *next_ready {
                Some(at) if at > now => at,
                _ => now,
            };
            *next_ready = Some(ready + self.interval);
            ready.saturating_duration_since(now)
        };
        // sleep outside the lock so unrelated callers are not held up
        if !wait.is_zero() {
            trace!("pacing request, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }
}

impl Clone for RequestPacer {
    fn clone(&self) -> Self {
        Self {
            interval: self.interval,
            next_ready: Arc::clone(&self.next_ready),
        }
    }
}
