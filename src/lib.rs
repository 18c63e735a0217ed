//! Cosmo bridge client - WebSocket link to Cosmo Bluetooth buttons.
//!
//! This library drives physical Cosmo devices (buttons with LEDs) through
//! a locally running bridge process that speaks JSON over a WebSocket.
//!
//! # Architecture
//!
//! - **Connection Manager**: owns the single socket, reconnects with
//!   exponential backoff, fans decoded events out to listeners
//! - **Device State Store**: merged local view of every device, with
//!   button state normalized to pressed / released
//! - **Command Facade**: typed device commands, best-effort reconnect for
//!   fire-and-forget lighting calls
//!
//! # Quick Start
//!
//! ```no_run
//! use cosmo_bridge::{BridgeConfig, ClientEvent, CosmoClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = CosmoClient::new(BridgeConfig::from_env())?;
//!
//!     client.add_listener(|event: &ClientEvent| println!("event: {}", event.kind()));
//!     client.connect();
//!
//!     // Reconnects first if the link is down
//!     client.set_color("A", 4, 0, 0);
//!
//!     for device in client.devices() {
//!         println!("{} is {}", device.id, device.status);
//!     }
//!
//!     client.disconnect(true);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Command facade: [`CosmoClient`] |
//! | [`config`] | [`BridgeConfig`] and URL resolution |
//! | [`device`] | Device State Store |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire envelopes and listener events |
//! | [`transport`] | Socket, reconnection and listener fan-out |
//!
//! # Features
//!
//! - `tls`: enables `wss://` bridge URLs (rustls with webpki roots)

// ============================================================================
// Modules
// ============================================================================

/// Command facade.
///
/// [`CosmoClient`] wraps a [`ConnectionManager`] with typed commands.
pub mod client;

/// Bridge URL resolution and tuning.
pub mod config;

/// Device State Store.
pub mod device;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire envelopes and listener events.
pub mod protocol;

/// Bridge transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    ActivityEntry, ActivityLevel, ActivityLog, CharacteristicTable, CosmoClient, LockState,
};

// Configuration
pub use config::BridgeConfig;

// Device state
pub use device::{DeviceSnapshot, DeviceStore};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{DeviceId, ListenerId};

// Protocol types
pub use protocol::{
    BridgeMessage, ButtonState, ClientEvent, ClientMessage, Color, DeviceEntry, DeviceStatus,
    ErrorEvent, ErrorSource,
};

// Transport types
pub use transport::{
    ConnectionManager, ConnectionState, Connector, ListenerHandle, ReconnectPolicy, RetryPolicy,
    Socket, WsConnector,
};
