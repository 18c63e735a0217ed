//! Device State Store.
//!
//! Keeps the authoritative local view of every device the bridge reported.
//! The store is fed exclusively by the connection manager's inbound path;
//! consumers only ever see clones.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::identifiers::DeviceId;
use crate::protocol::{BridgeMessage, ButtonState, DeviceEntry};

use super::DeviceSnapshot;

// ============================================================================
// DeviceStore
// ============================================================================

/// Mapping of device id → [`DeviceSnapshot`], plus the bridge's device order.
#[derive(Debug, Clone, Default)]
pub struct DeviceStore {
    /// Records by id.
    devices: FxHashMap<DeviceId, DeviceSnapshot>,
    /// Ids in the order of the most recent `devices` envelope.
    order: Vec<DeviceId>,
}

impl DeviceStore {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the store from an inbound envelope.
    ///
    /// Returns `true` if the envelope touched device state.
    pub fn observe(&mut self, message: &BridgeMessage) -> bool {
        match message {
            BridgeMessage::Devices { devices } => {
                self.apply_devices(devices);
                true
            }
            BridgeMessage::ButtonPress(event) => {
                self.apply_button(&event.device_id, ButtonState::Pressed, event.press_value);
                true
            }
            BridgeMessage::ButtonRelease(event) => {
                self.apply_button(&event.device_id, ButtonState::Released, event.press_value);
                true
            }
            BridgeMessage::ButtonStateChanged(change) => {
                self.apply_button(&change.device_id, change.resolved_state(), change.press_value);
                true
            }
            BridgeMessage::Error(_) | BridgeMessage::Other { .. } => false,
        }
    }

    /// Replaces membership with `entries`, merging attributes of devices
    /// that were already known.
    pub fn apply_devices(&mut self, entries: &[DeviceEntry]) {
        let mut previous = std::mem::take(&mut self.devices);
        self.order.clear();

        for entry in entries {
            let listed = self.devices.contains_key(&entry.id);

            self.devices
                .entry(entry.id.clone())
                .or_insert_with(|| {
                    previous
                        .remove(&entry.id)
                        .unwrap_or_else(|| DeviceSnapshot::new(entry.id.clone()))
                })
                .merge_entry(entry);

            if !listed {
                self.order.push(entry.id.clone());
            }
        }

        trace!(count = self.devices.len(), "Device list replaced");
    }

    /// Sets one device's button state, creating the record if needed.
    pub fn apply_button(&mut self, device_id: &DeviceId, state: ButtonState, press_value: Option<f64>) {
        self.devices
            .entry(device_id.clone())
            .or_insert_with(|| DeviceSnapshot::new(device_id.clone()))
            .apply_button(state, press_value);

        trace!(device_id = %device_id, state = %state, "Button state updated");
    }

    /// Returns one device's record.
    #[inline]
    #[must_use]
    pub fn get(&self, device_id: &str) -> Option<&DeviceSnapshot> {
        self.devices.get(device_id)
    }

    /// Returns a copy of the full id → record mapping.
    #[must_use]
    pub fn snapshot(&self) -> FxHashMap<DeviceId, DeviceSnapshot> {
        self.devices.clone()
    }

    /// Returns the listed devices in bridge order.
    #[must_use]
    pub fn devices(&self) -> Vec<DeviceSnapshot> {
        self.order
            .iter()
            .filter_map(|id| self.devices.get(id))
            .cloned()
            .collect()
    }

    /// Returns the ids of listed devices that are connected, in bridge order.
    #[must_use]
    pub fn connected_ids(&self) -> Vec<DeviceId> {
        self.order
            .iter()
            .filter(|id| self.devices.get(*id).is_some_and(|d| d.connected))
            .cloned()
            .collect()
    }

    /// Returns the number of known devices.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` if no device is known.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::DeviceStatus;

    fn feed(store: &mut DeviceStore, text: &str) {
        let message = BridgeMessage::decode(text).expect("decode");
        store.observe(&message);
    }

    #[test]
    fn test_devices_scenario() {
        let mut store = DeviceStore::new();
        feed(
            &mut store,
            r#"{"type":"devices","devices":[{"id":"A","connected":true,"buttonState":"pressed","batteryLevel":87}]}"#,
        );

        let a = store.get("A").expect("A known");
        assert_eq!(a.button_state, ButtonState::Pressed);
        assert_eq!(a.status, DeviceStatus::Connected);
        assert_eq!(a.battery_level, Some(87));

        feed(
            &mut store,
            r#"{"type":"buttonRelease","deviceId":"A","pressValue":0}"#,
        );

        let a = store.get("A").expect("A known");
        assert_eq!(a.button_state, ButtonState::Released);
        assert_eq!(a.press_value, 0.0);
        assert_eq!(a.battery_level, Some(87));
        assert_eq!(a.status, DeviceStatus::Connected);
    }

    #[test]
    fn test_device_list_replaces_membership() {
        let mut store = DeviceStore::new();
        feed(
            &mut store,
            r#"{"type":"devices","devices":[{"id":"A","connected":true},{"id":"B","connected":true}]}"#,
        );
        feed(
            &mut store,
            r#"{"type":"devices","devices":[{"id":"B","connected":false},{"id":"C","connected":true}]}"#,
        );

        assert!(store.get("A").is_none());
        assert_eq!(store.len(), 2);
        let ids: Vec<_> = store.devices().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![DeviceId::from("B"), DeviceId::from("C")]);
        assert_eq!(store.connected_ids(), vec![DeviceId::from("C")]);
    }

    #[test]
    fn test_device_list_merges_attributes() {
        let mut store = DeviceStore::new();
        feed(
            &mut store,
            r#"{"type":"devices","devices":[{"id":"A","connected":true,"serial":"S1","color":{"r":1,"g":2,"b":3}}]}"#,
        );
        feed(&mut store, r#"{"type":"devices","devices":[{"id":"A","connected":true}]}"#);

        let a = store.get("A").unwrap();
        assert_eq!(a.serial.as_deref(), Some("S1"));
        assert_eq!(a.color.map(|c| c.g), Some(2));
    }

    #[test]
    fn test_button_press_for_unknown_device_creates_record() {
        let mut store = DeviceStore::new();
        feed(&mut store, r#"{"type":"buttonPress","deviceId":"Z","pressValue":0.4}"#);

        let z = store.get("Z").unwrap();
        assert!(z.is_pressed());
        assert_eq!(z.press_value, 0.4);
        assert!(store.devices().is_empty());
    }

    #[test]
    fn test_button_state_changed_uses_state_field() {
        let mut store = DeviceStore::new();
        feed(
            &mut store,
            r#"{"type":"buttonStateChanged","deviceId":"A","state":true,"pressValue":1.0}"#,
        );
        assert!(store.get("A").unwrap().is_pressed());

        feed(
            &mut store,
            r#"{"type":"buttonStateChanged","deviceId":"A","buttonState":"released"}"#,
        );
        let a = store.get("A").unwrap();
        assert!(!a.is_pressed());
        assert_eq!(a.press_value, 0.0);
    }

    #[test]
    fn test_errors_and_unknown_types_do_not_touch_state() {
        let mut store = DeviceStore::new();
        let message = BridgeMessage::decode(r#"{"type":"error","error":"x","deviceId":"A"}"#).unwrap();
        assert!(!store.observe(&message));
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_ids_in_list_are_listed_once() {
        let mut store = DeviceStore::new();
        feed(
            &mut store,
            r#"{"type":"devices","devices":[{"id":"A","connected":false},{"id":"A","connected":true}]}"#,
        );
        assert_eq!(store.devices().len(), 1);
        assert!(store.get("A").unwrap().connected);
    }
}
