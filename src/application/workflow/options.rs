//! Activity scheduling options and retry policy

use crate::domain::call::DEFAULT_TIMEOUT_SECS;
use std::time::Duration;

/// Retry policy for retryable activity failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub max_interval: Duration,
}

impl RetryPolicy {
    /// Single attempt, never retried
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = delay.min(self.max_interval.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(200),
            backoff_coefficient: 2.0,
            max_interval: Duration::from_secs(5),
        }
    }
}

/// Bounds applied to one activity invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    /// How long the activity may wait for a free worker slot
    pub schedule_to_start: Duration,
    /// How long one attempt may run
    pub start_to_close: Duration,
    pub retry: RetryPolicy,
}

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub schedule_to_start: Duration,
    pub max_concurrent_activities: usize,
    /// Call timeout applied when the session payload carries none
    pub default_timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl EngineOptions {
    /// Options for an activity of a call with the given execution timeout
    pub fn activity_options(&self, start_to_close: Duration) -> ActivityOptions {
        ActivityOptions {
            schedule_to_start: self.schedule_to_start,
            start_to_close,
            retry: self.retry.clone(),
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            schedule_to_start: Duration::from_secs(1),
            max_concurrent_activities: 64,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
        }
    }
}
