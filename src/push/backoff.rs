//! Reconnect policy for the push channel.
//!
//! Implements exponential backoff with configurable parameters.

use std::time::Duration;

use crate::config::ReconnectSettings;

/// Reconnect policy implementing exponential backoff.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Maximum number of consecutive attempts before the channel gives up.
    pub max_attempts: u32,
    /// Initial backoff duration in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum backoff duration in milliseconds (cap for exponential growth).
    pub max_delay_ms: u64,
    /// Multiplier applied to the backoff after each attempt.
    pub multiplier: f64,
}

impl ReconnectPolicy {
    /// Create a new ReconnectPolicy from configuration settings.
    pub fn new(settings: &ReconnectSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            initial_delay_ms: settings.initial_delay_ms,
            max_delay_ms: settings.max_delay_ms,
            multiplier: settings.multiplier,
        }
    }

    /// Calculate the backoff delay before retry number `attempt`.
    ///
    /// Uses exponential backoff: `initial_delay * multiplier^attempt`,
    /// capped at `max_delay_ms`. Pure function of its input, so retry
    /// timing is testable without any clock.
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }

    /// Check whether another attempt is allowed after `attempts` failures.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            multiplier: 2.0,
        }
    }
}
