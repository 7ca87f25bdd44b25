//! Provider-side asynchronous actions and waiting on them

use crate::error::{ActionError, CloudError, Result};
use crate::provider::ActionSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// An asynchronous operation started by a mutating call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Provider-assigned action ID
    pub id: u64,

    /// Command executed by the action (e.g. "set_firewall_rules")
    pub command: String,

    /// Current status
    pub status: ActionStatus,

    /// Progress in percent
    pub progress: u32,

    /// When the action was started
    pub started: DateTime<Utc>,

    /// When the action finished, only set once terminal
    pub finished: Option<DateTime<Utc>>,

    /// Resources the action relates to
    #[serde(default)]
    pub resources: Vec<ActionResource>,

    /// Error payload if the action failed
    pub error: Option<ActionErrorPayload>,
}

impl Action {
    pub fn is_terminal(&self) -> bool {
        self.status != ActionStatus::Running
    }
}

/// Status of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Running,
    Success,
    Error,
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionStatus::Running => write!(f, "running"),
            ActionStatus::Success => write!(f, "success"),
            ActionStatus::Error => write!(f, "error"),
        }
    }
}

/// Reference to a resource touched by an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResource {
    pub id: u64,

    #[serde(rename = "type")]
    pub kind: String,
}

/// Error reported by a failed action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionErrorPayload {
    pub code: String,
    pub message: String,
}

/// Polling cadence and deadline for action waits (capped exponential backoff)
#[derive(Debug, Clone, PartialEq)]
pub struct WaitConfig {
    /// Delay before the first re-fetch (milliseconds)
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay (milliseconds)
    pub max_delay_ms: u64,

    /// Exponential multiplier
    pub multiplier: f64,

    /// Overall deadline for one action (milliseconds)
    pub timeout_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            timeout_ms: 600_000,
        }
    }
}

impl WaitConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Delay before poll number `attempt` (milliseconds)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        (delay as u64).min(self.max_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Blocks until actions reach a terminal status
pub struct ActionTracker<'a, S: ActionSource + ?Sized> {
    source: &'a S,
    config: WaitConfig,
}

impl<'a, S: ActionSource + ?Sized> ActionTracker<'a, S> {
    pub fn new(source: &'a S, config: WaitConfig) -> Self {
        Self { source, config }
    }

    /// Wait for a single action.
    ///
    /// Returns the terminal action on success, `ActionError::failed` when the
    /// provider reports an error, and `ActionError::timeout` with the last
    /// observed record when the deadline passes first.
    pub async fn wait(&self, action: Action) -> Result<Action> {
        let deadline = Instant::now() + self.config.timeout();
        let mut current = action;
        let mut attempt = 0;

        loop {
            match current.status {
                ActionStatus::Success => {
                    tracing::info!("Action {} ({}) finished", current.id, current.command);
                    return Ok(current);
                }
                ActionStatus::Error => {
                    tracing::warn!("Action {} ({}) failed", current.id, current.command);
                    return Err(CloudError::Action(ActionError::failed(current)));
                }
                ActionStatus::Running => {}
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    "Timed out waiting for action {} ({}) at {}%",
                    current.id,
                    current.command,
                    current.progress
                );
                return Err(CloudError::Action(ActionError::timeout(current)));
            }

            let delay = Duration::from_millis(self.config.delay_for_attempt(attempt));
            sleep(delay.min(deadline - now)).await;
            attempt += 1;

            current = self.source.get_action(current.id).await?;
            tracing::debug!(
                "Polled action {} ({}): {} {}%",
                current.id,
                current.command,
                current.status,
                current.progress
            );
        }
    }

    /// Wait for every action in order, stopping at the first failure
    pub async fn wait_all(&self, actions: Vec<Action>) -> Result<Vec<Action>> {
        let mut finished = Vec::with_capacity(actions.len());
        for action in actions {
            finished.push(self.wait(action).await?);
        }
        Ok(finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_calculation() {
        let config = WaitConfig {
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            timeout_ms: 60_000,
        };

        assert_eq!(config.delay_for_attempt(0), 1000);
        assert_eq!(config.delay_for_attempt(1), 2000);
        assert_eq!(config.delay_for_attempt(2), 4000);
        assert_eq!(config.delay_for_attempt(3), 8000);
        assert_eq!(config.delay_for_attempt(4), 10_000); // capped at max
    }

    #[test]
    fn test_action_deserialize() {
        let json = r#"{
            "id": 13,
            "command": "set_firewall_rules",
            "status": "running",
            "progress": 0,
            "started": "2016-01-30T23:55:00+00:00",
            "finished": null,
            "resources": [{"id": 38, "type": "firewall"}],
            "error": null
        }"#;

        let action: Action = serde_json::from_str(json).unwrap();
        assert_eq!(action.id, 13);
        assert_eq!(action.status, ActionStatus::Running);
        assert!(!action.is_terminal());
        assert_eq!(action.resources[0].kind, "firewall");
        assert!(action.finished.is_none());
    }
}
