//! Device State Store.
//!
//! Maintains a merged local view of every device the bridge reports,
//! normalizing the heterogeneous button-state encodings into
//! [`ButtonState`](crate::protocol::ButtonState).
//!
//! | Envelope | Effect |
//! |----------|--------|
//! | `devices` | Replace membership, merge attributes, derive status |
//! | `buttonPress` / `buttonRelease` | Set one device pressed / released |
//! | `buttonStateChanged` | Set one device from `buttonState` or `state` |

// ============================================================================
// Submodules
// ============================================================================

mod snapshot;
mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use snapshot::DeviceSnapshot;
pub use store::DeviceStore;
