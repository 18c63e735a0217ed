//! Bounded activity log.
//!
//! Records what the client did (locks, characteristic operations,
//! connection changes) for display to an operator. Oldest entries are
//! evicted once the capacity is reached.

use std::collections::VecDeque;
use std::fmt;
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::protocol::ClientEvent;

// ============================================================================
// Types
// ============================================================================

/// Severity of an activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityLevel {
    /// Normal activity.
    Info,
    /// Something degraded.
    Warn,
    /// Something failed.
    Error,
}

impl ActivityLevel {
    /// Returns the level name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One activity entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    /// When the entry was recorded.
    pub timestamp: SystemTime,
    /// Severity.
    pub level: ActivityLevel,
    /// Human-readable description.
    pub message: String,
}

// ============================================================================
// ActivityLog
// ============================================================================

/// Ring of the most recent activity entries.
#[derive(Debug)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<ActivityEntry>>,
    capacity: usize,
}

impl ActivityLog {
    /// Creates an empty log holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest when full.
    pub fn record(&self, level: ActivityLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            ActivityLevel::Info => info!(activity = %message),
            ActivityLevel::Warn => warn!(activity = %message),
            ActivityLevel::Error => error!(activity = %message),
        }

        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(ActivityEntry {
            timestamp: SystemTime::now(),
            level,
            message,
        });
    }

    /// Records an info entry.
    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.record(ActivityLevel::Info, message);
    }

    /// Records an error entry.
    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.record(ActivityLevel::Error, message);
    }

    /// Records the connection-level events worth showing an operator.
    pub(crate) fn record_event(&self, event: &ClientEvent) {
        match event {
            ClientEvent::Connected => self.info("Connected to bridge"),
            ClientEvent::Disconnected => self.record(ActivityLevel::Warn, "Disconnected from bridge"),
            ClientEvent::MaxReconnectAttemptsReached => {
                self.error("Max reconnection attempts reached");
            }
            ClientEvent::Error(err) => match (&err.device_id, &err.operation) {
                (Some(device), Some(operation)) => {
                    self.error(format!("{} ({operation} on {device})", err.error));
                }
                (Some(device), None) => self.error(format!("{} (device {device})", err.error)),
                _ => self.error(err.error.clone()),
            },
            ClientEvent::Bridge(_) => {}
        }
    }

    /// Returns the entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns the maximum number of entries kept.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
