//! Events delivered to listeners.
//!
//! Listeners see one tagged union: decoded bridge envelopes plus the
//! synthetic lifecycle events the client raises itself (`connected`,
//! `disconnected`, `max_reconnect_attempts_reached`, local `error`).
//! Synthetic events never travel over the wire.

// ============================================================================
// Imports
// ============================================================================

use crate::identifiers::DeviceId;

use super::message::{BridgeError, BridgeMessage};

// ============================================================================
// Constants
// ============================================================================

/// Error text for a socket-level failure.
pub const CONNECTION_ERROR: &str = "Connection error occurred";

/// Error text for a frame that could not be decoded.
pub const PARSE_ERROR: &str = "Failed to parse message";

/// Error text for a socket that could not be opened.
pub const CREATE_ERROR: &str = "Failed to create WebSocket connection";

// ============================================================================
// ErrorEvent
// ============================================================================

/// Where an [`ErrorEvent`] came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ErrorSource {
    /// Raised by this client (socket or decode failure).
    #[default]
    Local,
    /// Reported by the bridge in an `error` envelope.
    Bridge,
}

/// Error surfaced to listeners, local or bridge-reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    /// Error description.
    pub error: String,
    /// Origin of the error.
    pub source: ErrorSource,
    /// Device context supplied by the bridge.
    pub device_id: Option<DeviceId>,
    /// Operation context supplied by the bridge.
    pub operation: Option<String>,
}

impl ErrorEvent {
    /// Creates a client-side error without device context.
    #[must_use]
    pub fn local(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            source: ErrorSource::Local,
            device_id: None,
            operation: None,
        }
    }
}

impl From<BridgeError> for ErrorEvent {
    fn from(err: BridgeError) -> Self {
        Self {
            error: err.error,
            source: ErrorSource::Bridge,
            device_id: err.device_id,
            operation: err.operation,
        }
    }
}

// ============================================================================
// ClientEvent
// ============================================================================

/// Everything a listener can receive.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Socket opened.
    Connected,
    /// Socket closed, deliberately or not.
    Disconnected,
    /// Reconnect budget exhausted; the manager stopped.
    MaxReconnectAttemptsReached,
    /// Transport, protocol or bridge-reported error.
    Error(ErrorEvent),
    /// Any other decoded bridge envelope.
    Bridge(BridgeMessage),
}

impl ClientEvent {
    /// Returns the wire-style name of the event.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::MaxReconnectAttemptsReached => "max_reconnect_attempts_reached",
            Self::Error(_) => "error",
            Self::Bridge(message) => message.kind(),
        }
    }

    /// Returns `true` for events the client raised itself.
    ///
    /// Bridge-reported errors are not synthetic even though they arrive as
    /// [`ClientEvent::Error`].
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        match self {
            Self::Bridge(_) => false,
            Self::Error(err) => err.source == ErrorSource::Local,
            _ => true,
        }
    }

    /// Returns the bridge envelope, if any.
    #[must_use]
    pub fn as_bridge(&self) -> Option<&BridgeMessage> {
        match self {
            Self::Bridge(message) => Some(message),
            _ => None,
        }
    }
}

impl From<BridgeMessage> for ClientEvent {
    /// Bridge `error` envelopes become [`ClientEvent::Error`]; all others are
    /// wrapped unchanged.
    fn from(message: BridgeMessage) -> Self {
        match message {
            BridgeMessage::Error(err) => Self::Error(err.into()),
            other => Self::Bridge(other),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
