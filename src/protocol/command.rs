//! Outbound envelopes (client → bridge).
//!
//! Every envelope is a JSON object discriminated by its `type` field.
//!
//! # Envelopes
//!
//! | `type` | Fields |
//! |--------|--------|
//! | `getDevices` | (none) |
//! | `lockDevices` | `isLocked`, `deviceIds` |
//! | `setColor` | `deviceId`, `color{r,g,b}` |
//! | `setMode` | `deviceId`, `data:[mode]` |
//! | `setLuminosity` | `deviceId`, `data:[intensity]` |
//! | `characteristicChanged` | `deviceId`, `characteristicUUID`, `value:[..]` |
//! | `writeCharacteristic` | `deviceId`, `characteristicUUID`, `value?` |
//! | `readCharacteristic` | `deviceId`, `characteristicUUID` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::DeviceId;

// ============================================================================
// Constants
// ============================================================================

/// Highest per-channel LED level in the Cosmo color scale.
pub const MAX_COLOR_LEVEL: u8 = 4;

/// Highest LED luminosity accepted by the bridge.
pub const MAX_LUMINOSITY: u8 = 64;

/// Clamps an intensity to `0..=MAX_LUMINOSITY`.
#[inline]
#[must_use]
pub fn clamp_luminosity(intensity: u8) -> u8 {
    intensity.min(MAX_LUMINOSITY)
}

// ============================================================================
// Color
// ============================================================================

/// LED color on the device's 0–4 per-channel scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red level.
    pub r: u8,
    /// Green level.
    pub g: u8,
    /// Blue level.
    pub b: u8,
}

impl Color {
    /// LEDs off.
    pub const OFF: Self = Self::new(0, 0, 0);

    /// Creates a color. Values are passed to the bridge as given.
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Returns the color with every channel limited to [`MAX_COLOR_LEVEL`].
    #[inline]
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            r: self.r.min(MAX_COLOR_LEVEL),
            g: self.g.min(MAX_COLOR_LEVEL),
            b: self.b.min(MAX_COLOR_LEVEL),
        }
    }
}

// ============================================================================
// ClientMessage
// ============================================================================

/// An envelope sent from the client to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Ask the bridge for the full device list.
    GetDevices,

    /// Lock (or unlock) a set of devices to this client.
    #[serde(rename_all = "camelCase")]
    LockDevices {
        /// `true` to lock, `false` to release.
        is_locked: bool,
        /// Devices affected. Empty when unlocking all.
        device_ids: Vec<DeviceId>,
    },

    /// Set the LED color.
    #[serde(rename_all = "camelCase")]
    SetColor {
        /// Target device.
        device_id: DeviceId,
        /// Color on the 0–4 scale.
        color: Color,
    },

    /// Set the device lighting mode.
    #[serde(rename_all = "camelCase")]
    SetMode {
        /// Target device.
        device_id: DeviceId,
        /// Single-element mode payload.
        data: [u8; 1],
    },

    /// Set LED brightness.
    #[serde(rename_all = "camelCase")]
    SetLuminosity {
        /// Target device.
        device_id: DeviceId,
        /// Single-element intensity payload (0–64).
        data: [u8; 1],
    },

    /// Generic characteristic write issued by named operation.
    #[serde(rename_all = "camelCase")]
    CharacteristicChanged {
        /// Target device.
        device_id: DeviceId,
        /// Resolved characteristic UUID.
        #[serde(rename = "characteristicUUID")]
        characteristic_uuid: String,
        /// Value bytes/items.
        value: Vec<Value>,
    },

    /// Raw characteristic write.
    #[serde(rename_all = "camelCase")]
    WriteCharacteristic {
        /// Target device.
        device_id: DeviceId,
        /// Characteristic UUID.
        #[serde(rename = "characteristicUUID")]
        characteristic_uuid: String,
        /// Value to write.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },

    /// Raw characteristic read.
    #[serde(rename_all = "camelCase")]
    ReadCharacteristic {
        /// Target device.
        device_id: DeviceId,
        /// Characteristic UUID.
        #[serde(rename = "characteristicUUID")]
        characteristic_uuid: String,
    },
}

impl ClientMessage {
    /// Creates a `lockDevices` envelope locking `device_ids`.
    #[must_use]
    pub fn lock(device_ids: Vec<DeviceId>) -> Self {
        Self::LockDevices {
            is_locked: true,
            device_ids,
        }
    }

    /// Creates a `lockDevices` envelope releasing every device.
    #[must_use]
    pub fn unlock_all() -> Self {
        Self::LockDevices {
            is_locked: false,
            device_ids: Vec::new(),
        }
    }

    /// Creates a `setColor` envelope.
    #[must_use]
    pub fn set_color(device_id: impl Into<DeviceId>, color: Color) -> Self {
        Self::SetColor {
            device_id: device_id.into(),
            color,
        }
    }

    /// Creates a `setMode` envelope.
    #[must_use]
    pub fn set_mode(device_id: impl Into<DeviceId>, mode: u8) -> Self {
        Self::SetMode {
            device_id: device_id.into(),
            data: [mode],
        }
    }

    /// Creates a `setLuminosity` envelope.
    #[must_use]
    pub fn set_luminosity(device_id: impl Into<DeviceId>, intensity: u8) -> Self {
        Self::SetLuminosity {
            device_id: device_id.into(),
            data: [intensity],
        }
    }

    /// Returns the wire `type` of this envelope.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GetDevices => "getDevices",
            Self::LockDevices { .. } => "lockDevices",
            Self::SetColor { .. } => "setColor",
            Self::SetMode { .. } => "setMode",
            Self::SetLuminosity { .. } => "setLuminosity",
            Self::CharacteristicChanged { .. } => "characteristicChanged",
            Self::WriteCharacteristic { .. } => "writeCharacteristic",
            Self::ReadCharacteristic { .. } => "readCharacteristic",
        }
    }

    /// Returns the target device, if the envelope has one.
    #[must_use]
    pub fn device_id(&self) -> Option<&DeviceId> {
        match self {
            Self::GetDevices | Self::LockDevices { .. } => None,
            Self::SetColor { device_id, .. }
            | Self::SetMode { device_id, .. }
            | Self::SetLuminosity { device_id, .. }
            | Self::CharacteristicChanged { device_id, .. }
            | Self::WriteCharacteristic { device_id, .. }
            | Self::ReadCharacteristic { device_id, .. } => Some(device_id),
        }
    }

    /// Serializes to a single-line JSON text frame.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn to_value(message: &ClientMessage) -> Value {
        serde_json::to_value(message).expect("serialize")
    }

    #[test]
    fn test_get_devices() {
        assert_eq!(
            to_value(&ClientMessage::GetDevices),
            json!({ "type": "getDevices" })
        );
    }

    #[test]
    fn test_lock_devices() {
        let message = ClientMessage::lock(vec![DeviceId::from("A"), DeviceId::from("B")]);
        assert_eq!(
            to_value(&message),
            json!({ "type": "lockDevices", "isLocked": true, "deviceIds": ["A", "B"] })
        );
        assert_eq!(
            to_value(&ClientMessage::unlock_all()),
            json!({ "type": "lockDevices", "isLocked": false, "deviceIds": [] })
        );
    }

    #[test]
    fn test_set_color() {
        let message = ClientMessage::set_color("A", Color::new(4, 0, 2));
        assert_eq!(
            to_value(&message),
            json!({ "type": "setColor", "deviceId": "A", "color": { "r": 4, "g": 0, "b": 2 } })
        );
    }

    #[test]
    fn test_set_mode_and_luminosity_wrap_data() {
        assert_eq!(
            to_value(&ClientMessage::set_mode("A", 4)),
            json!({ "type": "setMode", "deviceId": "A", "data": [4] })
        );
        assert_eq!(
            to_value(&ClientMessage::set_luminosity("A", 64)),
            json!({ "type": "setLuminosity", "deviceId": "A", "data": [64] })
        );
    }

    #[test]
    fn test_characteristic_uuid_field_name() {
        let message = ClientMessage::CharacteristicChanged {
            device_id: DeviceId::from("A"),
            characteristic_uuid: "0000ffe1".to_string(),
            value: vec![json!(1)],
        };
        let value = to_value(&message);
        assert_eq!(value["characteristicUUID"], "0000ffe1");
        assert_eq!(value["type"], "characteristicChanged");
    }

    #[test]
    fn test_write_characteristic_without_value() {
        let write = ClientMessage::WriteCharacteristic {
            device_id: DeviceId::from("A"),
            characteristic_uuid: "u".to_string(),
            value: None,
        };
        assert!(to_value(&write).get("value").is_none());
    }

    #[test]
    fn test_kind_matches_wire_type() {
        let message = ClientMessage::set_luminosity("A", 1);
        assert_eq!(to_value(&message)["type"], message.kind());
        assert_eq!(message.device_id().map(DeviceId::as_str), Some("A"));
        assert!(ClientMessage::GetDevices.device_id().is_none());
    }

    #[test]
    fn test_color_clamped() {
        assert_eq!(Color::new(9, 4, 1).clamped(), Color::new(4, 4, 1));
        assert_eq!(clamp_luminosity(200), MAX_LUMINOSITY);
    }

    #[test]
    fn test_to_json_is_single_line() {
        let text = ClientMessage::set_color("A", Color::OFF).to_json().unwrap();
        assert!(!text.contains('\n'));
    }
}
