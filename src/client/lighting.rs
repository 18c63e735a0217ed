//! LED control.

use crate::identifiers::DeviceId;
use crate::protocol::Color;

use super::core::CosmoClient;

// ============================================================================
// CosmoClient - Lighting
// ============================================================================

impl CosmoClient {
    /// Sets a device's LED color (0–4 per channel).
    ///
    /// Reconnects first if needed; failures are logged only.
    pub fn set_color(&self, device_id: impl Into<DeviceId>, r: u8, g: u8, b: u8) {
        self.inner.manager.set_color(device_id, Color::new(r, g, b));
    }

    /// Sets a device's lighting mode.
    ///
    /// Reconnects first if needed; failures are logged only.
    pub fn set_mode(&self, device_id: impl Into<DeviceId>, mode: u8) {
        self.inner.manager.set_mode(device_id, mode);
    }

    /// Sets a device's LED intensity (0–64).
    ///
    /// Never reconnects. Returns `false` if not connected.
    pub fn set_luminosity(&self, device_id: impl Into<DeviceId>, intensity: u8) -> bool {
        self.inner.manager.set_luminosity(device_id, intensity)
    }
}
