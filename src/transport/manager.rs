//! Connection manager.
//!
//! Owns the single link to the bridge: opens it, keeps it alive across
//! transient drops with exponential backoff, decodes inbound frames, keeps
//! the [`DeviceStore`] in sync and fans every event out to listeners.
//!
//! # State Machine
//!
//! ```text
//! Idle ─connect()─► Connecting ─open─► Connected
//!                      ▲    │             │
//!          backoff timer    │ failure     │ close
//!                      │    ▼             ▼
//!                   Disconnected ◄────────┘
//!                      │
//!                      ▼  disconnect(true) / budget exhausted
//!                   Stopped
//! ```
//!
//! Every socket carries a generation number. Calls that tear the link down
//! (`disconnect`, `refresh_connection`) bump it, so callbacks from the old
//! socket become no-ops and a socket that finishes opening late closes
//! itself.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::config::BridgeConfig;
use crate::device::{DeviceSnapshot, DeviceStore};
use crate::error::{Error, Result};
use crate::identifiers::{DeviceId, ListenerId};
use crate::protocol::event::{CONNECTION_ERROR, CREATE_ERROR, PARSE_ERROR};
use crate::protocol::{BridgeMessage, ClientEvent, ClientMessage, Color, ErrorEvent};

use super::backoff::ReconnectPolicy;
use super::connection::{CloseReason, SocketEvent, SocketLink, run_event_loop};
use super::listeners::{ListenerHandle, ListenerRegistry};
use super::retry::{Attempt, RetryOutcome, RetryPolicy};
use super::socket::{Connector, WsConnector};

// ============================================================================
// Constants
// ============================================================================

/// Delay between tearing down and reopening in `refresh_connection`.
pub const REFRESH_DELAY: Duration = Duration::from_millis(100);

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the bridge link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Never connected.
    #[default]
    Idle,
    /// Open attempt in flight.
    Connecting,
    /// Socket open.
    Connected,
    /// Socket closed; a reconnect may be pending.
    Disconnected,
    /// Permanently disconnected or reconnect budget exhausted.
    Stopped,
}

impl ConnectionState {
    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Internal State
// ============================================================================

/// Mutable link state, guarded by one lock.
struct LinkState {
    phase: ConnectionState,
    should_reconnect: bool,
    attempts: u32,
    generation: u64,
    link: Option<SocketLink>,
    reconnect_timer: Option<JoinHandle<()>>,
}

impl LinkState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }
}

struct Inner {
    url: Url,
    reconnect: ReconnectPolicy,
    retry: RetryPolicy,
    connector: Arc<dyn Connector>,
    runtime: Handle,
    state: Mutex<LinkState>,
    listeners: Arc<ListenerRegistry>,
    store: RwLock<DeviceStore>,
    phase_tx: watch::Sender<ConnectionState>,
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Handle to the bridge link.
///
/// Cloning is cheap; all clones drive the same link. Create one per process
/// and hand clones to whoever needs it.
///
/// Background tasks keep the link alive after every handle is dropped; call
/// [`disconnect(true)`](Self::disconnect) to shut it down.
///
/// # Example
///
/// ```ignore
/// let manager = ConnectionManager::with_websocket(&BridgeConfig::from_env())?;
///
/// let handle = manager.add_listener(|event| println!("{}", event.kind()));
/// manager.connect();
///
/// manager.set_color("A", Color::new(4, 0, 0));
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.inner.url.as_str())
            .field("state", &self.state())
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

// ============================================================================
// ConnectionManager - Constructors
// ============================================================================

impl ConnectionManager {
    /// Creates a manager that opens sockets through `connector`.
    ///
    /// Does not connect; call [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the bridge URL is invalid
    /// - [`Error::Config`] if called outside a tokio runtime
    pub fn new(config: &BridgeConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let url = config.resolve_url()?;
        let runtime = Handle::try_current()
            .map_err(|e| Error::config(format!("ConnectionManager needs a tokio runtime: {e}")))?;
        let (phase_tx, _) = watch::channel(ConnectionState::Idle);

        debug!(url = %url, "ConnectionManager created");

        Ok(Self {
            inner: Arc::new(Inner {
                url,
                reconnect: config.reconnect,
                retry: config.retry,
                connector,
                runtime,
                state: Mutex::new(LinkState {
                    phase: ConnectionState::Idle,
                    should_reconnect: true,
                    attempts: 0,
                    generation: 0,
                    link: None,
                    reconnect_timer: None,
                }),
                listeners: Arc::new(ListenerRegistry::default()),
                store: RwLock::new(DeviceStore::new()),
                phase_tx,
            }),
        })
    }

    /// Creates a manager backed by [`WsConnector`].
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_websocket(config: &BridgeConfig) -> Result<Self> {
        Self::new(config, Arc::new(WsConnector::new()))
    }
}

// ============================================================================
// ConnectionManager - Lifecycle
// ============================================================================

impl ConnectionManager {
    /// Opens the link. No-op while connecting or connected.
    ///
    /// Failures are reported to listeners and retried per the reconnect
    /// policy; nothing is returned to the caller.
    pub fn connect(&self) {
        let mut state = self.inner.state.lock();
        self.inner.start_connect(&mut state);
    }

    /// Closes the link and cancels any pending reconnect.
    ///
    /// With `permanent`, automatic reconnection is turned off (until
    /// [`refresh_connection`](Self::refresh_connection)) and pending
    /// best-effort sends give up. Without it, a later [`connect`](Self::connect)
    /// resumes normal reconnection.
    pub fn disconnect(&self, permanent: bool) {
        let link = {
            let mut state = self.inner.state.lock();
            state.cancel_timer();
            if permanent {
                state.should_reconnect = false;
            }
            state.generation += 1;
            let next = if permanent {
                ConnectionState::Stopped
            } else {
                ConnectionState::Disconnected
            };
            self.inner.set_phase(&mut state, next);
            state.link.take()
        };

        info!(url = %self.inner.url, permanent, "Disconnecting from bridge");

        if let Some(link) = link {
            link.close();
            self.inner.emit(&ClientEvent::Disconnected);
        }
    }

    /// Restarts the link from scratch.
    ///
    /// Resets the attempt counter, re-enables reconnection, closes any live
    /// socket and connects again after [`REFRESH_DELAY`].
    pub fn refresh_connection(&self) {
        let link = {
            let mut state = self.inner.state.lock();
            state.cancel_timer();
            state.attempts = 0;
            state.should_reconnect = true;
            state.generation += 1;
            self.inner.set_phase(&mut state, ConnectionState::Disconnected);
            let generation = state.generation;
            state.reconnect_timer = Some(self.inner.schedule_connect(generation, REFRESH_DELAY));
            state.link.take()
        };

        info!(url = %self.inner.url, "Refreshing bridge connection");

        if let Some(link) = link {
            link.close();
            self.inner.emit(&ClientEvent::Disconnected);
        }
    }
}

// ============================================================================
// ConnectionManager - Sending
// ============================================================================

impl ConnectionManager {
    /// Sends a command over the live socket.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] unless the link is connected
    /// - [`Error::Json`] if serialization fails
    pub fn send_message(&self, message: &ClientMessage) -> Result<()> {
        let frame = message.to_json()?;
        self.inner.send_frame(frame)?;
        debug!(kind = message.kind(), "Message sent");
        Ok(())
    }

    /// Sends an arbitrary JSON envelope over the live socket.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] unless the link is connected
    /// - [`Error::Json`] if serialization fails
    pub fn send_json(&self, value: &Value) -> Result<()> {
        let frame = serde_json::to_string(value)?;
        self.inner.send_frame(frame)
    }

    /// Sends a command if connected; otherwise logs and returns `false`.
    pub fn send_if_connected(&self, message: &ClientMessage) -> bool {
        match self.send_message(message) {
            Ok(()) => true,
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "Command not sent");
                false
            }
        }
    }

    /// Sends a command now, or reconnects and sends it once connected.
    ///
    /// If the link is down, triggers [`connect`](Self::connect) and polls per
    /// the retry policy; the command goes out exactly once when the link
    /// opens. Gives up (logged) on timeout or when the manager stops. A
    /// command issued while an open attempt is already in flight is dropped.
    pub fn send_when_connected(&self, message: ClientMessage) {
        match self.state() {
            ConnectionState::Connected => {
                self.send_if_connected(&message);
                return;
            }
            ConnectionState::Connecting => {
                warn!(kind = message.kind(), "Connection in progress; command dropped");
                return;
            }
            _ => {}
        }

        debug!(kind = message.kind(), "Not connected; reconnecting before send");
        self.connect();

        let manager = self.clone();
        let retry = self.inner.retry;
        self.inner.runtime.spawn(async move {
            let outcome = retry
                .run(|| match manager.state() {
                    ConnectionState::Connected => Attempt::Ready(()),
                    ConnectionState::Stopped => Attempt::Abort,
                    _ => Attempt::Pending,
                })
                .await;

            match outcome {
                RetryOutcome::Completed(()) => {
                    manager.send_if_connected(&message);
                }
                RetryOutcome::TimedOut => {
                    warn!(
                        kind = message.kind(),
                        timeout_ms = retry.timeout.as_millis() as u64,
                        "Gave up waiting for connection"
                    );
                }
                RetryOutcome::Aborted => {
                    debug!(kind = message.kind(), "Connection stopped; command dropped");
                }
            }
        });
    }

    /// Sets a device's LED color, reconnecting if needed.
    pub fn set_color(&self, device_id: impl Into<DeviceId>, color: Color) {
        self.send_when_connected(ClientMessage::set_color(device_id, color));
    }

    /// Sets a device's mode, reconnecting if needed.
    pub fn set_mode(&self, device_id: impl Into<DeviceId>, mode: u8) {
        self.send_when_connected(ClientMessage::set_mode(device_id, mode));
    }

    /// Sets a device's LED intensity. Only sent if already connected.
    pub fn set_luminosity(&self, device_id: impl Into<DeviceId>, intensity: u8) -> bool {
        self.send_if_connected(&ClientMessage::set_luminosity(device_id, intensity))
    }
}

// ============================================================================
// ConnectionManager - Listeners
// ============================================================================

impl ConnectionManager {
    /// Registers a listener for every event.
    pub fn add_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.add(Arc::new(listener))
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Returns the number of registered listeners.
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

// ============================================================================
// ConnectionManager - Accessors
// ============================================================================

impl ConnectionManager {
    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().phase
    }

    /// Returns `true` if the socket is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns the consecutive reconnect attempts since the last open.
    #[inline]
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.state.lock().attempts
    }

    /// Returns `false` after a permanent disconnect.
    #[inline]
    #[must_use]
    pub fn should_reconnect(&self) -> bool {
        self.inner.state.lock().should_reconnect
    }

    /// Returns the bridge URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Watches state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.phase_tx.subscribe()
    }

    /// Returns the known devices in bridge order.
    #[must_use]
    pub fn devices(&self) -> Vec<DeviceSnapshot> {
        self.inner.store.read().devices()
    }

    /// Returns one device.
    #[must_use]
    pub fn device(&self, device_id: &str) -> Option<DeviceSnapshot> {
        self.inner.store.read().get(device_id).cloned()
    }

    /// Returns a copy of every device record.
    #[must_use]
    pub fn snapshot(&self) -> FxHashMap<DeviceId, DeviceSnapshot> {
        self.inner.store.read().snapshot()
    }

    /// Returns the ids of devices the bridge reports as connected.
    #[must_use]
    pub fn connected_ids(&self) -> Vec<DeviceId> {
        self.inner.store.read().connected_ids()
    }
}

// ============================================================================
// ConnectionManager - Tasks
// ============================================================================

impl ConnectionManager {
    /// Spawns `future` on the runtime this manager was created on.
    pub(crate) fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.inner.runtime.spawn(future)
    }

    /// Like [`connect`](Self::connect), but skipped once the manager has
    /// been stopped or reconnection was turned off.
    ///
    /// Returns `true` if an open was started or already in progress.
    pub(crate) fn connect_if_enabled(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.phase == ConnectionState::Stopped || !state.should_reconnect {
            debug!(url = %self.inner.url, state = %state.phase, "Deferred connect skipped");
            return false;
        }
        self.inner.start_connect(&mut state);
        true
    }
}

// ============================================================================
// Inner - Socket Lifecycle
// ============================================================================

impl Inner {
    fn set_phase(&self, state: &mut LinkState, phase: ConnectionState) {
        if state.phase != phase {
            trace!(from = %state.phase, to = %phase, "Connection state changed");
            state.phase = phase;
            self.phase_tx.send_replace(phase);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    fn emit(&self, event: &ClientEvent) {
        trace!(kind = event.kind(), "Dispatching event");
        self.listeners.dispatch(event);
    }

    fn start_connect(self: &Arc<Self>, state: &mut LinkState) {
        if matches!(
            state.phase,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            debug!(state = %state.phase, "Already connecting or connected");
            return;
        }

        state.cancel_timer();
        state.generation += 1;
        let generation = state.generation;
        self.set_phase(state, ConnectionState::Connecting);

        info!(url = %self.url, attempt = state.attempts, "Connecting to bridge");

        let inner = Arc::clone(self);
        self.runtime.spawn(inner.run_socket(generation));
    }

    fn schedule_connect(self: &Arc<Self>, generation: u64, delay: Duration) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let mut state = inner.state.lock();
            if state.generation != generation {
                return;
            }
            state.reconnect_timer = None;
            if state.should_reconnect && state.phase == ConnectionState::Disconnected {
                inner.start_connect(&mut state);
            }
        })
    }

    async fn run_socket(self: Arc<Self>, generation: u64) {
        let socket = match self.connector.connect(&self.url).await {
            Ok(socket) => socket,
            Err(e) => {
                if self.is_current(generation) {
                    error!(url = %self.url, error = %e, "Failed to open socket");
                    self.emit(&ClientEvent::Error(ErrorEvent::local(CREATE_ERROR)));
                    self.handle_close(generation, CloseReason::Failed);
                }
                return;
            }
        };

        let (link, command_rx) = SocketLink::new();
        let opened = {
            let mut state = self.state.lock();
            if state.generation == generation {
                state.link = Some(link.clone());
                state.attempts = 0;
                self.set_phase(&mut state, ConnectionState::Connected);
                true
            } else {
                false
            }
        };

        if !opened {
            debug!(generation, "Socket opened after teardown; closing");
            let mut sink = socket.sink;
            let _ = sink.close().await;
            return;
        }

        info!(url = %self.url, "Connected to bridge");
        self.emit(&ClientEvent::Connected);

        match ClientMessage::GetDevices.to_json() {
            Ok(frame) => {
                if let Err(e) = link.send(frame) {
                    warn!(error = %e, "Failed to request device list");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode device list request"),
        }

        let reason = run_event_loop(socket, command_rx, |event| {
            self.handle_socket_event(generation, event);
        })
        .await;

        self.handle_close(generation, reason);
    }

    fn handle_socket_event(&self, generation: u64, event: SocketEvent) {
        if !self.is_current(generation) {
            trace!(generation, "Event from stale socket ignored");
            return;
        }

        match event {
            SocketEvent::Frame(text) => self.handle_frame(&text),
            SocketEvent::Error(e) => {
                error!(url = %self.url, error = %e, "WebSocket error");
                self.emit(&ClientEvent::Error(ErrorEvent::local(CONNECTION_ERROR)));
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        let mut message = match BridgeMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, raw = text, "Failed to parse message");
                self.emit(&ClientEvent::Error(ErrorEvent::local(PARSE_ERROR)));
                return;
            }
        };

        message.label_devices();
        if self.store.write().observe(&message) {
            trace!(kind = message.kind(), "Device state updated");
        }

        if let BridgeMessage::Error(err) = &message {
            error!(
                error = %err.error,
                device_id = ?err.device_id,
                operation = ?err.operation,
                "Bridge error"
            );
        }

        self.emit(&ClientEvent::from(message));
    }

    fn handle_close(self: &Arc<Self>, generation: u64, reason: CloseReason) {
        let exhausted = {
            let mut state = self.state.lock();
            if state.generation != generation {
                trace!(generation, "Close from stale socket ignored");
                return;
            }

            state.link = None;
            self.set_phase(&mut state, ConnectionState::Disconnected);
            debug!(url = %self.url, ?reason, "Socket closed");

            if !state.should_reconnect {
                false
            } else if self.reconnect.allows(state.attempts) {
                state.attempts += 1;
                let delay = self.reconnect.delay(state.attempts);
                info!(
                    attempt = state.attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                state.reconnect_timer = Some(self.schedule_connect(generation, delay));
                false
            } else {
                self.set_phase(&mut state, ConnectionState::Stopped);
                true
            }
        };

        self.emit(&ClientEvent::Disconnected);

        if exhausted {
            warn!(url = %self.url, "Max reconnection attempts reached");
            self.emit(&ClientEvent::MaxReconnectAttemptsReached);
        }
    }

    fn send_frame(&self, frame: String) -> Result<()> {
        let state = self.state.lock();
        match (&state.link, state.phase) {
            (Some(link), ConnectionState::Connected) => {
                trace!(len = frame.len(), "Queueing frame");
                link.send(frame)
            }
            _ => Err(Error::NotConnected),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
