//! Device list and locking.

use crate::error::Result;
use crate::identifiers::DeviceId;
use crate::protocol::ClientMessage;

use super::core::{CosmoClient, LockState};

// ============================================================================
// CosmoClient - Devices
// ============================================================================

impl CosmoClient {
    /// Asks the bridge for the full device list.
    ///
    /// The answer arrives as a `devices` event and updates the store.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`](crate::Error::NotConnected) unless connected
    pub fn get_devices(&self) -> Result<()> {
        self.inner.manager.send_message(&ClientMessage::GetDevices)
    }

    /// Locks `device_ids` to this client.
    ///
    /// Returns `false` (and records why) if not connected.
    pub fn lock_devices<I>(&self, device_ids: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<DeviceId>,
    {
        let device_ids: Vec<DeviceId> = device_ids.into_iter().map(Into::into).collect();

        if !self.is_connected() {
            self.inner
                .activity
                .error("Cannot lock devices - WebSocket not connected");
            return false;
        }

        let names: Vec<&str> = device_ids.iter().map(DeviceId::as_str).collect();
        self.inner
            .activity
            .info(format!("Locking devices: {}", names.join(", ")));

        self.send_lock(LockState {
            is_locked: true,
            device_ids,
        })
    }

    /// Releases every device.
    ///
    /// Returns `false` (and records why) if not connected.
    pub fn unlock_devices(&self) -> bool {
        if !self.is_connected() {
            self.inner
                .activity
                .error("Cannot unlock devices - WebSocket not connected");
            return false;
        }

        self.inner.activity.info("Unlocking all devices");
        self.send_lock(LockState::default())
    }

    /// Flips the lock state.
    ///
    /// Locking targets every device the bridge currently reports as
    /// connected.
    pub fn toggle_lock(&self) -> bool {
        if self.inner.lock_state.lock().is_locked {
            self.unlock_devices()
        } else {
            self.lock_devices(self.inner.manager.connected_ids())
        }
    }

    fn send_lock(&self, next: LockState) -> bool {
        let message = if next.is_locked {
            ClientMessage::lock(next.device_ids.clone())
        } else {
            ClientMessage::unlock_all()
        };

        let sent = self.inner.manager.send_if_connected(&message);
        if sent {
            *self.inner.lock_state.lock() = next;
        }
        sent
    }
}
