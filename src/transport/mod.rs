//! Bridge transport layer.
//!
//! This module owns the WebSocket link between this process and the
//! Cosmo bridge, and everything that keeps it alive.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                        ┌─────────────────┐
//! │  ConnectionManager   │                        │  Cosmo bridge   │
//! │                      │       WebSocket        │                 │
//! │  Connector → Socket  │◄──────────────────────►│  ws://host:8080 │
//! │  → event loop        │    JSON text frames    │                 │
//! │  → listeners / store │                        │                 │
//! └──────────────────────┘                        └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `ConnectionManager::connect` - spawn an open attempt
//! 2. `Connector::connect` - open the physical socket
//! 3. Event loop - forward commands, decode frames, fan out events
//! 4. Close - back off per `ReconnectPolicy` and reconnect
//! 5. `ConnectionManager::disconnect(true)` - stop for good
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Reconnect delay schedule and attempt budget |
//! | `connection` | Socket event loop |
//! | `listeners` | Listener registry and fan-out |
//! | `manager` | Connection state machine |
//! | `retry` | Bounded polling retry |
//! | `socket` | `Connector` trait and tungstenite connector |

// ============================================================================
// Submodules
// ============================================================================

/// Reconnect backoff.
pub mod backoff;

/// Socket event loop.
pub(crate) mod connection;

/// Listener registry.
pub mod listeners;

/// Connection state machine.
pub mod manager;

/// Bounded polling retry.
pub mod retry;

/// Physical socket abstraction.
pub mod socket;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::ReconnectPolicy;
pub use listeners::{Listener, ListenerHandle};
pub use manager::{ConnectionManager, ConnectionState, REFRESH_DELAY};
pub use retry::{Attempt, RetryOutcome, RetryPolicy};
pub use socket::{Connector, FrameSink, FrameStream, Socket, WsConnector};
