//! WebSocket protocol message types.
//!
//! This module defines the JSON envelopes exchanged with the Cosmo bridge
//! and the events handed to listeners.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `ClientMessage` | Client → Bridge | Device commands |
//! | `BridgeMessage` | Bridge → Client | Device list, button events, errors |
//! | `ClientEvent` | Client → Listeners | Bridge messages + lifecycle events |
//!
//! Every envelope is a single-line JSON object discriminated by `type`.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Outbound envelopes and LED types |
//! | `message` | Inbound envelopes and button-state normalization |
//! | `event` | Listener event union |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound envelopes.
pub mod command;

/// Listener events.
pub mod event;

/// Inbound envelopes.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{ClientMessage, Color, MAX_COLOR_LEVEL, MAX_LUMINOSITY, clamp_luminosity};
pub use event::{ClientEvent, ErrorEvent, ErrorSource};
pub use message::{
    BridgeError, BridgeMessage, ButtonEvent, ButtonState, ButtonStateChange, DeviceEntry,
    DeviceStatus,
};
