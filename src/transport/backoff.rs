//! Reconnection backoff.
//!
//! After `n` consecutive unexpected closes the next attempt waits
//! `min(base * 2^n, cap)`.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Base reconnect delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Reconnect delay ceiling.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Exponential reconnect schedule with an optional attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay unit doubled per consecutive failure.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Consecutive attempts allowed; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Returns the delay before the attempt that follows `failures`
    /// consecutive closes.
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        2u32.checked_pow(failures)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Returns `true` if another attempt may follow `attempts_made`.
    #[inline]
    #[must_use]
    pub fn allows(&self, attempts_made: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts_made < max)
    }
}

// ============================================================================
// Tests
// ============================================================================
