//! Inbound envelopes (bridge → client).
//!
//! Frames are decoded in two steps: text → [`Value`], then dispatch on the
//! `type` field. Unknown types are kept as [`BridgeMessage::Other`] so they
//! can be forwarded to listeners untouched.
//!
//! # Envelopes
//!
//! | `type` | Fields |
//! |--------|--------|
//! | `devices` | `devices:[{id, connected, buttonState?, pressValue?, batteryLevel?, color?, serial?, firmware?, ...}]` |
//! | `buttonPress` / `buttonRelease` | `deviceId`, `pressValue?` |
//! | `buttonStateChanged` | `deviceId`, `buttonState` or `state`, `pressValue?` |
//! | `error` | `error`, `deviceId?`, `operation?` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::DeviceId;

use super::command::Color;

// ============================================================================
// ButtonState
// ============================================================================

/// Normalized button state. Only these two values ever reach consumers.
///
/// The bridge reports button state as `0`/`1`, `false`/`true` or
/// `"released"`/`"pressed"`. Deserialization collapses all of them here;
/// anything unrecognized becomes [`ButtonState::Released`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ButtonState {
    /// Not pressed (`0`).
    #[default]
    Released,
    /// Pressed (`1`).
    Pressed,
}

impl ButtonState {
    /// Normalizes any wire representation.
    #[must_use]
    pub fn from_wire(value: &Value) -> Self {
        let pressed = match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64() == Some(1.0),
            Value::String(s) => s == "pressed",
            _ => false,
        };

        if pressed {
            Self::Pressed
        } else {
            Self::Released
        }
    }

    /// Returns `0` or `1`.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Released => 0,
            Self::Pressed => 1,
        }
    }

    /// Returns `true` when pressed.
    #[inline]
    #[must_use]
    pub const fn is_pressed(self) -> bool {
        matches!(self, Self::Pressed)
    }
}

impl From<bool> for ButtonState {
    fn from(pressed: bool) -> Self {
        if pressed { Self::Pressed } else { Self::Released }
    }
}

impl fmt::Display for ButtonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

impl Serialize for ButtonState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for ButtonState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_wire(&value))
    }
}

// ============================================================================
// DeviceStatus
// ============================================================================

/// Status label derived from the wire `connected` flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum DeviceStatus {
    /// Seen by the bridge but not connected.
    #[default]
    Available,
    /// Connected to the bridge.
    Connected,
}

impl DeviceStatus {
    /// Derives the label from a `connected` flag.
    #[inline]
    #[must_use]
    pub const fn from_connected(connected: bool) -> Self {
        if connected {
            Self::Connected
        } else {
            Self::Available
        }
    }

    /// Returns the display label.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Connected => "Connected",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeviceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let connected = value
            .as_str()
            .is_some_and(|s| s.eq_ignore_ascii_case("connected"));
        Ok(Self::from_connected(connected))
    }
}

// ============================================================================
// Lenient Fields
// ============================================================================

/// Deserializes an optional attribute, mapping a malformed value to `None`
/// instead of failing the whole envelope.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Deserializes a loosely typed flag. `null`, `false`, `0` and `""` are
/// false; anything else is true.
fn truthy<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Deserializes a list, treating `null` as empty.
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// DeviceEntry
// ============================================================================

/// One device as listed in a `devices` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
    /// Device identifier.
    pub id: DeviceId,

    /// Whether the bridge holds a connection to the device.
    #[serde(default, deserialize_with = "truthy")]
    pub connected: bool,

    /// Derived label. Overwritten from `connected` when the envelope is received.
    #[serde(default)]
    pub status: DeviceStatus,

    /// Raw button state, already normalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_state: Option<ButtonState>,

    /// Last analog press value.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub press_value: Option<f64>,

    /// Battery percentage.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u8>,

    /// Current LED color.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,

    /// Serial number.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,

    /// Firmware version.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,

    /// Any further attributes the bridge reports.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceEntry {
    /// Creates an entry with only the required fields.
    #[must_use]
    pub fn new(id: impl Into<DeviceId>, connected: bool) -> Self {
        Self {
            id: id.into(),
            connected,
            status: DeviceStatus::from_connected(connected),
            button_state: None,
            press_value: None,
            battery_level: None,
            color: None,
            serial: None,
            firmware: None,
            extra: Map::new(),
        }
    }
}

// ============================================================================
// Button Envelopes
// ============================================================================

/// Body of `buttonPress` and `buttonRelease`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonEvent {
    /// Device whose button changed.
    pub device_id: DeviceId,
    /// Analog press value.
    #[serde(default, deserialize_with = "lenient")]
    pub press_value: Option<f64>,
}

/// Body of `buttonStateChanged`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonStateChange {
    /// Device whose button changed.
    pub device_id: DeviceId,
    /// Preferred state field.
    #[serde(default)]
    pub button_state: Option<ButtonState>,
    /// Alternate state field used by some bridge versions.
    #[serde(default)]
    pub state: Option<ButtonState>,
    /// Analog press value.
    #[serde(default, deserialize_with = "lenient")]
    pub press_value: Option<f64>,
}

impl ButtonStateChange {
    /// Returns whichever state field is present, `buttonState` first.
    #[must_use]
    pub fn resolved_state(&self) -> ButtonState {
        self.button_state.or(self.state).unwrap_or_default()
    }
}

// ============================================================================
// BridgeError
// ============================================================================

/// Body of an `error` envelope reported by the bridge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeError {
    /// Error description.
    #[serde(default = "unknown_error")]
    pub error: String,
    /// Device the failure relates to.
    #[serde(default)]
    pub device_id: Option<DeviceId>,
    /// Operation that failed.
    #[serde(default)]
    pub operation: Option<String>,
}

fn unknown_error() -> String {
    "Unknown error".to_string()
}

// ============================================================================
// BridgeMessage
// ============================================================================

#[derive(Deserialize)]
struct DevicesBody {
    #[serde(default, deserialize_with = "null_as_empty")]
    devices: Vec<DeviceEntry>,
}

/// A decoded inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeMessage {
    /// Full device list.
    Devices {
        /// Devices in bridge order.
        devices: Vec<DeviceEntry>,
    },
    /// Button pressed.
    ButtonPress(ButtonEvent),
    /// Button released.
    ButtonRelease(ButtonEvent),
    /// Button state changed.
    ButtonStateChanged(ButtonStateChange),
    /// Bridge-reported failure.
    Error(BridgeError),
    /// Any other `type`, forwarded as received.
    Other {
        /// The `type` value.
        kind: String,
        /// The whole envelope.
        payload: Value,
    },
}

impl BridgeMessage {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the frame is not JSON
    /// - [`Error::Protocol`] if there is no string `type`, or a known type
    ///   carries a malformed body
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Dispatches an already parsed envelope on its `type`.
    pub fn from_value(value: Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("message has no string `type` field"))?
            .to_string();

        let message = match kind.as_str() {
            "devices" => {
                let body: DevicesBody = decode_body(&kind, value)?;
                Self::Devices {
                    devices: body.devices,
                }
            }
            "buttonPress" => Self::ButtonPress(decode_body(&kind, value)?),
            "buttonRelease" => Self::ButtonRelease(decode_body(&kind, value)?),
            "buttonStateChanged" => Self::ButtonStateChanged(decode_body(&kind, value)?),
            "error" => Self::Error(decode_body(&kind, value)?),
            _ => Self::Other {
                kind,
                payload: value,
            },
        };

        Ok(message)
    }

    /// Returns the wire `type`.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Devices { .. } => "devices",
            Self::ButtonPress(_) => "buttonPress",
            Self::ButtonRelease(_) => "buttonRelease",
            Self::ButtonStateChanged(_) => "buttonStateChanged",
            Self::Error(_) => "error",
            Self::Other { kind, .. } => kind,
        }
    }

    /// Returns the device a per-device envelope refers to.
    #[must_use]
    pub fn device_id(&self) -> Option<&DeviceId> {
        match self {
            Self::ButtonPress(e) | Self::ButtonRelease(e) => Some(&e.device_id),
            Self::ButtonStateChanged(c) => Some(&c.device_id),
            Self::Error(e) => e.device_id.as_ref(),
            Self::Devices { .. } | Self::Other { .. } => None,
        }
    }

    /// Rewrites every device's status label from its `connected` flag.
    pub(crate) fn label_devices(&mut self) {
        if let Self::Devices { devices } = self {
            for device in devices.iter_mut() {
                device.status = DeviceStatus::from_connected(device.connected);
            }
        }
    }
}

fn decode_body<T: DeserializeOwned>(kind: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::protocol(format!("malformed `{kind}` message: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
