//! Command facade.
//!
//! [`CosmoClient`] turns high-level intents into bridge envelopes and
//! routes them through the [`ConnectionManager`](crate::transport::ConnectionManager).
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | Client struct, construction, passthroughs |
//! | `devices` | Device list, lock / unlock / toggle |
//! | `lighting` | Color, mode, luminosity |
//! | `characteristic` | Named and raw characteristic operations |
//! | `activity` | Bounded activity log |
//!
//! # Failure Semantics
//!
//! | Operation | Not connected |
//! |-----------|---------------|
//! | `get_devices`, `write_characteristic`, `read_characteristic` | `Err(NotConnected)` |
//! | `lock_devices`, `unlock_devices`, `toggle_lock`, `set_luminosity`, `send_characteristic_operation` | `false`, logged |
//! | `set_color`, `set_mode` | reconnect and retry, logged on timeout |

// ============================================================================
// Submodules
// ============================================================================

mod activity;
mod characteristic;
mod core;
mod devices;
mod lighting;

// ============================================================================
// Re-exports
// ============================================================================

pub use activity::{ActivityEntry, ActivityLevel, ActivityLog};
pub use characteristic::CharacteristicTable;
pub use self::core::{CosmoClient, LockState};
