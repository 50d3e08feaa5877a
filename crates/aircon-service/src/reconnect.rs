//! Reconnection backoff for broker connections.

use std::time::Duration;

use crate::config::MqttConfig;

/// Exponential backoff between connection attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectOptions {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor per failed attempt.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectOptions {
    /// Backoff bounds from the broker configuration.
    pub fn from_config(config: &MqttConfig) -> Self {
        Self {
            initial_delay: Duration::from_secs(config.reconnect_min_secs),
            max_delay: Duration::from_secs(config.reconnect_max_secs),
            ..Self::default()
        }
    }

    /// Delay after `attempt` consecutive failures (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.min(63) as i32);
        if !delay_ms.is_finite() || delay_ms >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }
        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }
}

/// Tracks consecutive failures of one connection.
#[derive(Debug, Clone)]
pub struct Backoff {
    options: ReconnectOptions,
    attempt: u32,
}

impl Backoff {
    pub fn new(options: ReconnectOptions) -> Self {
        Self {
            options,
            attempt: 0,
        }
    }

    /// Delay to wait after the current failure; grows on every call.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.options.delay_for_attempt(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Forget past failures after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Consecutive failures so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}
