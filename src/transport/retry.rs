//! Bounded polling retry.
//!
//! Re-evaluates a condition every `interval` until it is ready, asks to
//! abort, or `timeout` elapses. Used by the best-effort device commands
//! to wait for a reconnect.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};

// ============================================================================
// Constants
// ============================================================================

/// Default polling interval.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Default overall bound.
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

/// Result of one evaluation of the retry condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// Condition met.
    Ready(T),
    /// Not yet; poll again.
    Pending,
    /// Give up immediately.
    Abort,
}

/// How a retry loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// The condition became ready.
    Completed(T),
    /// The timeout elapsed first.
    TimedOut,
    /// The condition asked to stop.
    Aborted,
}

// ============================================================================
// RetryPolicy
// ============================================================================

/// Polling interval and overall bound for a retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Time between evaluations.
    pub interval: Duration,
    /// Total time before giving up.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RETRY_INTERVAL,
            timeout: DEFAULT_RETRY_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Polls `check` every `interval`, the first time one interval from now.
    pub async fn run<T, F>(&self, mut check: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Attempt<T>,
    {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut ticker = interval_at(start + self.interval, self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match check() {
                Attempt::Ready(value) => return RetryOutcome::Completed(value),
                Attempt::Abort => return RetryOutcome::Aborted,
                Attempt::Pending => {}
            }

            if Instant::now() >= deadline {
                return RetryOutcome::TimedOut;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_test::{assert_pending, task};

    #[tokio::test(start_paused = true)]
    async fn test_completes_when_ready() {
        let mut polls = 0;
        let outcome = RetryPolicy::default()
            .run(|| {
                polls += 1;
                if polls == 3 { Attempt::Ready(polls) } else { Attempt::Pending }
            })
            .await;

        assert_eq!(outcome, RetryOutcome::Completed(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_after_one_interval() {
        let start = Instant::now();
        let outcome = RetryPolicy::default().run(|| Attempt::Ready(())).await;

        assert_eq!(outcome, RetryOutcome::Completed(()));
        assert_eq!(start.elapsed(), DEFAULT_RETRY_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_poll_eagerly() {
        let mut polls = 0u32;
        let policy = RetryPolicy::default();
        let mut retry = task::spawn(policy.run(|| {
            polls += 1;
            Attempt::Ready(())
        }));

        assert_pending!(retry.poll());
        drop(retry);
        assert_eq!(polls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let start = Instant::now();
        let mut polls = 0u32;
        let outcome: RetryOutcome<()> = RetryPolicy::default()
            .run(|| {
                polls += 1;
                Attempt::Pending
            })
            .await;

        assert_eq!(outcome, RetryOutcome::TimedOut);
        assert_eq!(start.elapsed(), DEFAULT_RETRY_TIMEOUT);
        assert_eq!(polls, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_stops_immediately() {
        let start = Instant::now();
        let outcome: RetryOutcome<()> = RetryPolicy::default().run(|| Attempt::Abort).await;

        assert_eq!(outcome, RetryOutcome::Aborted);
        assert!(start.elapsed() < DEFAULT_RETRY_TIMEOUT);
    }
}
