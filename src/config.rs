//! Client configuration.
//!
//! Resolves the bridge URL and carries the reconnect / retry tuning.
//!
//! # URL Resolution
//!
//! First match wins:
//!
//! 1. Explicit URL ([`BridgeConfig::with_url`])
//! 2. Host/port override ([`BridgeConfig::with_host`]), `wss://host:8443`
//!    when secure, else `ws://host:8080`
//! 3. `COSMO_WS_URL` (read by [`BridgeConfig::from_env`])
//! 4. `ws://localhost:8080`
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use cosmo_bridge::BridgeConfig;
//!
//! let config = BridgeConfig::from_env()
//!     .with_max_reconnect_attempts(10)
//!     .with_auto_connect(Duration::from_secs(1));
//!
//! let url = config.resolve_url()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::transport::{ReconnectPolicy, RetryPolicy};

// ============================================================================
// Constants
// ============================================================================

/// Bridge address used when nothing else is configured.
pub const DEFAULT_BRIDGE_URL: &str = "ws://localhost:8080";

/// Environment variable holding a full bridge URL.
pub const URL_ENV: &str = "COSMO_WS_URL";

/// Environment variable holding a bridge host.
pub const HOST_ENV: &str = "COSMO_WS_HOST";

/// Environment variable holding a bridge port (used with [`HOST_ENV`]).
pub const PORT_ENV: &str = "COSMO_WS_PORT";

/// Environment variable selecting `wss://` for a host override (`1`/`true`).
pub const SECURE_ENV: &str = "COSMO_WS_SECURE";

/// Plain bridge port.
pub const DEFAULT_PORT: u16 = 8080;

/// Port of the TLS proxy in front of the bridge.
pub const DEFAULT_SECURE_PORT: u16 = 8443;

/// Default number of activity log entries kept by the client.
pub const DEFAULT_ACTIVITY_LOG_CAPACITY: usize = 100;

// ============================================================================
// HostOverride
// ============================================================================

/// Host/port override, mirroring the `?wsHost=&wsPort=` page parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOverride {
    /// Bridge host name or address.
    pub host: String,
    /// Explicit port, else the scheme default.
    pub port: Option<u16>,
    /// Use `wss://`.
    pub secure: bool,
}

impl HostOverride {
    /// Renders the override as a URL string.
    #[must_use]
    pub fn to_url(&self) -> String {
        let (scheme, default_port) = if self.secure {
            ("wss", DEFAULT_SECURE_PORT)
        } else {
            ("ws", DEFAULT_PORT)
        };
        format!("{scheme}://{}:{}", self.host, self.port.unwrap_or(default_port))
    }
}

// ============================================================================
// BridgeConfig
// ============================================================================

/// Configuration for a [`CosmoClient`](crate::CosmoClient) /
/// [`ConnectionManager`](crate::transport::ConnectionManager).
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Explicit URL, highest priority.
    url: Option<String>,
    /// Host/port override.
    host: Option<HostOverride>,
    /// URL taken from the environment.
    env_url: Option<String>,
    /// Reconnection backoff.
    pub reconnect: ReconnectPolicy,
    /// Best-effort send retry.
    pub retry: RetryPolicy,
    /// Delay before the first automatic `connect()`; `None` disables it.
    pub auto_connect: Option<Duration>,
    /// Number of activity log entries kept.
    pub activity_log_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl BridgeConfig {
    /// Creates a configuration with default values and no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self {
            url: None,
            host: None,
            env_url: None,
            reconnect: ReconnectPolicy::default(),
            retry: RetryPolicy::default(),
            auto_connect: None,
            activity_log_capacity: DEFAULT_ACTIVITY_LOG_CAPACITY,
        }
    }

    /// Creates a configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates a configuration reading variables through `lookup`.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();
        config.env_url = lookup(URL_ENV).filter(|s| !s.trim().is_empty());

        if let Some(host) = lookup(HOST_ENV).filter(|s| !s.trim().is_empty()) {
            let port = lookup(PORT_ENV).and_then(|p| p.trim().parse().ok());
            let secure = lookup(SECURE_ENV)
                .is_some_and(|s| matches!(s.trim(), "1" | "true" | "yes"));
            config.host = Some(HostOverride { host, port, secure });
        }

        config
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BridgeConfig {
    /// Sets an explicit bridge URL.
    #[inline]
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets a host override.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>, port: Option<u16>, secure: bool) -> Self {
        self.host = Some(HostOverride {
            host: host.into(),
            port,
            secure,
        });
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Limits the number of consecutive reconnect attempts.
    #[inline]
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, max_attempts: u32) -> Self {
        self.reconnect.max_attempts = Some(max_attempts);
        self
    }

    /// Sets the best-effort send retry policy.
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Connects automatically `delay` after the client is created.
    #[inline]
    #[must_use]
    pub fn with_auto_connect(mut self, delay: Duration) -> Self {
        self.auto_connect = Some(delay);
        self
    }

    /// Sets how many activity log entries are kept.
    #[inline]
    #[must_use]
    pub fn with_activity_log_capacity(mut self, capacity: usize) -> Self {
        self.activity_log_capacity = capacity.max(1);
        self
    }
}

// ============================================================================
// Resolution
// ============================================================================

impl BridgeConfig {
    /// Returns the URL string that wins the priority order, unvalidated.
    #[must_use]
    pub fn url_candidate(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        if let Some(host) = &self.host {
            return host.to_url();
        }
        if let Some(url) = &self.env_url {
            return url.clone();
        }
        DEFAULT_BRIDGE_URL.to_string()
    }

    /// Resolves and validates the bridge URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL does not parse or its scheme is
    /// not `ws`/`wss`.
    pub fn resolve_url(&self) -> Result<Url> {
        let candidate = self.url_candidate();
        let url = Url::parse(candidate.trim())
            .map_err(|e| Error::config(format!("invalid bridge URL {candidate:?}: {e}")))?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::config(format!(
                "bridge URL must use ws:// or wss://, got {other}://"
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
