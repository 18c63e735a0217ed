//! Per-device record.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::identifiers::DeviceId;
use crate::protocol::{ButtonState, Color, DeviceEntry, DeviceStatus};

// ============================================================================
// DeviceSnapshot
// ============================================================================

/// Local view of one device, merged from every envelope that mentioned it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    /// Device identifier.
    pub id: DeviceId,
    /// Whether the bridge holds a connection to the device.
    pub connected: bool,
    /// Label derived from `connected`.
    pub status: DeviceStatus,
    /// Normalized button state.
    pub button_state: ButtonState,
    /// Last analog press value, `0.0` when never reported.
    pub press_value: f64,
    /// Battery percentage.
    pub battery_level: Option<u8>,
    /// Firmware version.
    pub firmware: Option<String>,
    /// Serial number.
    pub serial: Option<String>,
    /// Current LED color.
    pub color: Option<Color>,
    /// Further attributes reported in the device list.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceSnapshot {
    /// Creates an empty, unconnected record.
    #[must_use]
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            connected: false,
            status: DeviceStatus::Available,
            button_state: ButtonState::Released,
            press_value: 0.0,
            battery_level: None,
            firmware: None,
            serial: None,
            color: None,
            extra: Map::new(),
        }
    }

    /// Merges a device-list entry.
    ///
    /// Button state and press value are always rewritten (absent means
    /// released / `0.0`); the remaining optional attributes only change when
    /// the entry carries them.
    pub fn merge_entry(&mut self, entry: &DeviceEntry) {
        self.connected = entry.connected;
        self.status = DeviceStatus::from_connected(entry.connected);
        self.button_state = entry.button_state.unwrap_or_default();
        self.press_value = entry.press_value.unwrap_or(0.0);

        if let Some(level) = entry.battery_level {
            self.battery_level = Some(level);
        }
        if let Some(color) = entry.color {
            self.color = Some(color);
        }
        if let Some(serial) = &entry.serial {
            self.serial = Some(serial.clone());
        }
        if let Some(firmware) = &entry.firmware {
            self.firmware = Some(firmware.clone());
        }
        for (key, value) in &entry.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Applies a button event.
    pub fn apply_button(&mut self, state: ButtonState, press_value: Option<f64>) {
        self.button_state = state;
        self.press_value = press_value.unwrap_or(0.0);
    }

    /// Returns `true` when the button is held.
    #[inline]
    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.button_state.is_pressed()
    }
}

// ============================================================================
// Tests
// ============================================================================
