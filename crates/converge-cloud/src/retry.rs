//! Bounded retry for deletes rejected while a resource is still in use

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy for "still in use" delete conflicts.
///
/// Only API errors whose message matches the in-use conflict are retried;
/// the delay grows linearly with the attempt number.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictRetry {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,

    /// Delay unit multiplied by the attempt number (milliseconds)
    pub step_ms: u64,
}

impl Default for ConflictRetry {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            step_ms: 500,
        }
    }
}

impl ConflictRetry {
    /// Delay after failed attempt number `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.step_ms * attempt as u64)
    }

    /// Run `op` until it succeeds, fails with another error, or the
    /// attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_conflict_in_use() && attempt < self.max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        "Attempt {}/{} rejected ({}), retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_conflict_in_use() {
                        tracing::warn!("Giving up after {} attempts: {}", attempt, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}
