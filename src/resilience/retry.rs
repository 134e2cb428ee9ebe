//! Bounded retry with exponential backoff and jitter.
//!
//! Used for single-record compare-and-swap loops against the status store.
//! Whole-document rewrites are never retried; that rule lives at the call
//! sites, this module only supplies the budget and delays.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::system;

/// Retry budget and backoff shape for CAS loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds
    pub base_delay_ms: u64,
    /// Exponential multiplier applied per subsequent attempt
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 - 1.0) applied on top of the computed delay
    pub jitter_factor: f64,
    /// Hard cap on any single delay, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: system::DEFAULT_CAS_RETRY_ATTEMPTS,
            base_delay_ms: 50,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after a failed attempt (0-based). Exponential in the
    /// attempt number, jittered, capped at `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let jittered = if self.jitter_factor > 0.0 {
            base * (1.0 + fastrand::f64() * self.jitter_factor)
        } else {
            base
        };
        Duration::from_millis((jittered as u64).min(self.max_delay_ms))
    }

    /// Whether another attempt remains after `attempt` (0-based) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}
