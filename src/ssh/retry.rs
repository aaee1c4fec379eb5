//! Connect retry policy
//!
//! Fixed one second delay by default; callers may opt into exponential
//! backoff with a cap.

use std::time::Duration;

/// Retry configuration for `TransportSession::connect`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one (minimum 1)
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_backoff: Duration,

    /// Multiplier applied per further attempt (1.0 keeps the delay fixed)
    pub backoff_multiplier: f64,

    /// Upper bound for any single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Fixed delay between attempts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self.backoff_multiplier = 1.0;
        self
    }

    /// Exponential backoff parameters
    pub fn with_backoff(mut self, initial: Duration, multiplier: f64, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.backoff_multiplier = multiplier;
        self.max_backoff = max;
        self
    }

    /// Attempts actually made; zero is treated as one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after the failed attempt with index `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        let delay_ms = (self.initial_backoff.as_millis() as f64 * factor)
            .min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }
}
