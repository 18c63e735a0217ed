//! Characteristic operations.
//!
//! Named operations (`"setColor"`, `"vibrate"`, ...) are mapped to BLE
//! characteristic UUIDs by a host-supplied [`CharacteristicTable`].

use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::DeviceId;
use crate::protocol::ClientMessage;

use super::core::CosmoClient;

// ============================================================================
// CharacteristicTable
// ============================================================================

/// Operation name → characteristic UUID lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacteristicTable {
    entries: FxHashMap<String, String>,
}

impl CharacteristicTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry (builder style).
    #[must_use]
    pub fn with(mut self, operation: impl Into<String>, uuid: impl Into<String>) -> Self {
        self.insert(operation, uuid);
        self
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, operation: impl Into<String>, uuid: impl Into<String>) {
        self.entries.insert(operation.into(), uuid.into());
    }

    /// Looks up an operation.
    #[inline]
    #[must_use]
    pub fn get(&self, operation: &str) -> Option<&str> {
        self.entries.get(operation).map(String::as_str)
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for CharacteristicTable
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// CosmoClient - Characteristics
// ============================================================================

impl CosmoClient {
    /// Resolves a named operation to its characteristic UUID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOperation`] if the table has no entry.
    pub fn characteristic_uuid(&self, operation: &str) -> Result<String> {
        self.inner
            .characteristics
            .read()
            .get(operation)
            .map(str::to_owned)
            .ok_or_else(|| Error::unknown_operation(operation))
    }

    /// Sends a named characteristic operation.
    ///
    /// A non-array `value` is wrapped in a one-element array. Returns
    /// `false` (and records why) if not connected or the operation is
    /// unknown; nothing is sent in either case.
    pub fn send_characteristic_operation(
        &self,
        device_id: impl Into<DeviceId>,
        operation: &str,
        value: Value,
    ) -> bool {
        let device_id = device_id.into();

        if !self.is_connected() {
            self.inner
                .activity
                .error("Cannot send operation - WebSocket not connected");
            return false;
        }

        let characteristic_uuid = match self.characteristic_uuid(operation) {
            Ok(uuid) => uuid,
            Err(e) => {
                self.inner.activity.error(format!("{e} for device {device_id}"));
                return false;
            }
        };

        let value = match value {
            Value::Array(items) => items,
            other => vec![other],
        };

        debug!(device_id = %device_id, operation, uuid = %characteristic_uuid, "Characteristic operation");
        self.inner
            .activity
            .info(format!("Sending operation {operation} to device {device_id}"));

        self.inner
            .manager
            .send_if_connected(&ClientMessage::CharacteristicChanged {
                device_id,
                characteristic_uuid,
                value,
            })
    }

    /// Writes a characteristic by UUID.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] unless connected
    pub fn write_characteristic(
        &self,
        device_id: impl Into<DeviceId>,
        characteristic_uuid: impl Into<String>,
        value: Option<Value>,
    ) -> Result<()> {
        self.inner
            .manager
            .send_message(&ClientMessage::WriteCharacteristic {
                device_id: device_id.into(),
                characteristic_uuid: characteristic_uuid.into(),
                value,
            })
    }

    /// Requests a characteristic read by UUID.
    ///
    /// The value arrives later as a bridge envelope.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] unless connected
    pub fn read_characteristic(
        &self,
        device_id: impl Into<DeviceId>,
        characteristic_uuid: impl Into<String>,
    ) -> Result<()> {
        self.inner
            .manager
            .send_message(&ClientMessage::ReadCharacteristic {
                device_id: device_id.into(),
                characteristic_uuid: characteristic_uuid.into(),
            })
    }
}

// ============================================================================
// Tests
// ============================================================================
