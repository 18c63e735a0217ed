//! Core client struct, construction and passthroughs.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::BridgeConfig;
use crate::device::DeviceSnapshot;
use crate::error::Result;
use crate::identifiers::{DeviceId, ListenerId};
use crate::protocol::ClientEvent;
use crate::transport::{
    ConnectionManager, ConnectionState, Connector, ListenerHandle, WsConnector,
};

use super::activity::{ActivityEntry, ActivityLog};
use super::characteristic::CharacteristicTable;

// ============================================================================
// Types
// ============================================================================

/// Last lock request sent by this client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockState {
    /// Whether devices are locked.
    pub is_locked: bool,
    /// Devices locked; empty when unlocked.
    pub device_ids: Vec<DeviceId>,
}

/// Internal shared state for a client.
pub(crate) struct ClientInner {
    /// Bridge link.
    pub manager: ConnectionManager,
    /// Operation → UUID lookup.
    pub characteristics: RwLock<CharacteristicTable>,
    /// Last lock request.
    pub lock_state: Mutex<LockState>,
    /// Operator-facing activity.
    pub activity: Arc<ActivityLog>,
    /// Feeds connection events into `activity`.
    pub activity_listener: ListenerHandle,
    /// Pending delayed first connect, if any.
    pub auto_connect: Mutex<Option<JoinHandle<()>>>,
}

impl ClientInner {
    fn cancel_auto_connect(&self) {
        if let Some(task) = self.auto_connect.lock().take() {
            task.abort();
        }
    }
}

// ============================================================================
// CosmoClient
// ============================================================================

/// High-level client for the Cosmo bridge.
///
/// Wraps a [`ConnectionManager`] with typed device commands, lock state,
/// characteristic operations and an activity log.
///
/// # Example
///
/// ```ignore
/// let client = CosmoClient::new(BridgeConfig::from_env())?;
/// client.connect();
///
/// client.set_color("A", 4, 0, 0);
/// client.set_luminosity("A", 32);
///
/// for device in client.devices() {
///     println!("{} {} {}", device.id, device.status, device.button_state);
/// }
/// ```
#[derive(Clone)]
pub struct CosmoClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl fmt::Debug for CosmoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosmoClient")
            .field("manager", &self.inner.manager)
            .field("lock_state", &*self.inner.lock_state.lock())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// CosmoClient - Constructors
// ============================================================================

impl CosmoClient {
    /// Creates a client connecting over WebSocket.
    ///
    /// Connects automatically if `config.auto_connect` is set.
    ///
    /// # Errors
    ///
    /// See [`ConnectionManager::new`].
    pub fn new(config: BridgeConfig) -> Result<Self> {
        Self::with_connector(config, Arc::new(WsConnector::new()))
    }

    /// Creates a client opening sockets through `connector`.
    ///
    /// # Errors
    ///
    /// See [`ConnectionManager::new`].
    pub fn with_connector(config: BridgeConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let manager = ConnectionManager::new(&config, connector)?;
        Ok(Self::from_manager(manager, &config))
    }

    /// Wraps an existing manager.
    #[must_use]
    pub fn from_manager(manager: ConnectionManager, config: &BridgeConfig) -> Self {
        let activity = Arc::new(ActivityLog::new(config.activity_log_capacity));
        let log = Arc::clone(&activity);
        let activity_listener = manager.add_listener(move |event| log.record_event(event));

        let auto_connect = config.auto_connect.map(|delay| {
            debug!(delay_ms = delay.as_millis() as u64, "Auto-connect scheduled");
            let deferred = manager.clone();
            manager.spawn(async move {
                tokio::time::sleep(delay).await;
                deferred.connect_if_enabled();
            })
        });

        Self {
            inner: Arc::new(ClientInner {
                manager,
                characteristics: RwLock::new(CharacteristicTable::new()),
                lock_state: Mutex::new(LockState::default()),
                activity,
                activity_listener,
                auto_connect: Mutex::new(auto_connect),
            }),
        }
    }

    /// Sets the characteristic lookup table.
    #[must_use]
    pub fn with_characteristics(self, table: CharacteristicTable) -> Self {
        self.set_characteristics(table);
        self
    }

    /// Replaces the characteristic lookup table.
    pub fn set_characteristics(&self, table: CharacteristicTable) {
        *self.inner.characteristics.write() = table;
    }
}

// ============================================================================
// CosmoClient - Accessors
// ============================================================================

impl CosmoClient {
    /// Returns the underlying manager.
    #[inline]
    #[must_use]
    pub fn manager(&self) -> &ConnectionManager {
        &self.inner.manager
    }

    /// Returns the last lock request.
    #[must_use]
    pub fn lock_state(&self) -> LockState {
        self.inner.lock_state.lock().clone()
    }

    /// Returns the activity log, oldest first.
    #[must_use]
    pub fn activity(&self) -> Vec<ActivityEntry> {
        self.inner.activity.entries()
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.manager.state()
    }

    /// Returns `true` if the socket is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.manager.is_connected()
    }

    /// Watches connection state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.manager.subscribe_state()
    }

    /// Returns the known devices in bridge order.
    #[must_use]
    pub fn devices(&self) -> Vec<DeviceSnapshot> {
        self.inner.manager.devices()
    }

    /// Returns one device.
    #[must_use]
    pub fn device(&self, device_id: &str) -> Option<DeviceSnapshot> {
        self.inner.manager.device(device_id)
    }

    /// Returns a copy of every device record.
    #[must_use]
    pub fn snapshot(&self) -> FxHashMap<DeviceId, DeviceSnapshot> {
        self.inner.manager.snapshot()
    }
}

// ============================================================================
// CosmoClient - Passthroughs
// ============================================================================

impl CosmoClient {
    /// See [`ConnectionManager::connect`].
    ///
    /// Supersedes a pending auto-connect.
    pub fn connect(&self) {
        self.inner.cancel_auto_connect();
        self.inner.manager.connect();
    }

    /// See [`ConnectionManager::disconnect`].
    ///
    /// Also cancels a pending auto-connect.
    pub fn disconnect(&self, permanent: bool) {
        self.inner.cancel_auto_connect();
        self.inner.manager.disconnect(permanent);
    }

    /// See [`ConnectionManager::refresh_connection`].
    pub fn refresh_connection(&self) {
        self.inner.manager.refresh_connection();
    }

    /// See [`ConnectionManager::add_listener`].
    pub fn add_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.inner.manager.add_listener(listener)
    }

    /// See [`ConnectionManager::remove_listener`].
    ///
    /// The client's own activity listener cannot be removed this way.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        if id == self.inner.activity_listener.id() {
            return false;
        }
        self.inner.manager.remove_listener(id)
    }
}
