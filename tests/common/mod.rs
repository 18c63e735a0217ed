//! Shared fixtures: an in-memory bridge behind a scriptable connector.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, sink, stream};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout};
use url::Url;

use cosmo_bridge::{ClientEvent, Connector, Error, Result, Socket};

/// Upper bound on any wait in virtual time.
pub const WAIT_LIMIT: Duration = Duration::from_secs(120);

// ============================================================================
// Tracing
// ============================================================================

/// Installs a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// BridgeEnd
// ============================================================================

/// The bridge side of one accepted socket.
pub struct BridgeEnd {
    to_client: mpsc::UnboundedSender<Result<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl BridgeEnd {
    /// Pushes a raw text frame to the client.
    pub fn send(&self, text: &str) {
        let _ = self.to_client.send(Ok(text.to_string()));
    }

    /// Pushes a transport error to the client.
    pub fn fail(&self, message: &str) {
        let _ = self.to_client.send(Err(Error::connection(message)));
    }

    /// Next frame written by the client, decoded.
    pub async fn next_frame(&mut self) -> Value {
        let text = timeout(WAIT_LIMIT, self.from_client.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client closed the socket");
        serde_json::from_str(&text).expect("client frame is not JSON")
    }

    /// Returns `None` once the client has closed its side.
    pub async fn closed(&mut self) -> Option<String> {
        timeout(WAIT_LIMIT, self.from_client.recv())
            .await
            .expect("timed out waiting for the client to close")
    }

    /// Frames already written and not yet read.
    pub fn pending_frames(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(text) = self.from_client.try_recv() {
            frames.push(serde_json::from_str(&text).expect("client frame is not JSON"));
        }
        frames
    }
}

// ============================================================================
// MockConnector
// ============================================================================

/// Connector whose sockets terminate in [`BridgeEnd`]s.
pub struct MockConnector {
    attempts: Mutex<Vec<Instant>>,
    refuse: AtomicBool,
    open_delay: Mutex<Duration>,
    accepted: mpsc::UnboundedSender<BridgeEnd>,
}

impl MockConnector {
    /// Creates a connector and the receiver of accepted bridge ends.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<BridgeEnd>) {
        let (accepted, bridges) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            attempts: Mutex::new(Vec::new()),
            refuse: AtomicBool::new(false),
            open_delay: Mutex::new(Duration::ZERO),
            accepted,
        });
        (connector, bridges)
    }

    /// Makes every following attempt fail.
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Delays every following open by `delay`.
    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock() = delay;
    }

    /// Number of open attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.lock().len()
    }

    /// Milliseconds between consecutive attempts.
    pub fn attempt_gaps_ms(&self) -> Vec<u128> {
        self.attempts
            .lock()
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis())
            .collect()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &Url) -> Result<Socket> {
        self.attempts.lock().push(Instant::now());

        let delay = *self.open_delay.lock();
        if !delay.is_zero() {
            sleep(delay).await;
        }

        if self.refuse.load(Ordering::SeqCst) {
            return Err(Error::connection("connection refused"));
        }

        let (to_client, from_bridge) = mpsc::unbounded_channel::<Result<String>>();
        let (to_bridge, from_client) = mpsc::unbounded_channel::<String>();

        let sink = sink::unfold(to_bridge, |tx, frame: String| async move {
            tx.send(frame).map_err(|_| Error::ConnectionClosed)?;
            Ok::<_, Error>(tx)
        });
        let stream = stream::unfold(from_bridge, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        let _ = self.accepted.send(BridgeEnd {
            to_client,
            from_client,
        });

        Ok(Socket::new(Box::pin(sink), stream.boxed()))
    }
}

// ============================================================================
// EventLog
// ============================================================================

/// Collects every event a listener sees.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ClientEvent>>>,
}

impl EventLog {
    /// Returns a listener appending to this log.
    pub fn listener(&self) -> impl Fn(&ClientEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event: &ClientEvent| events.lock().push(event.clone())
    }

    /// Event kinds in arrival order.
    pub fn kinds(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.kind().to_string()).collect()
    }

    /// Copies of the events.
    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().clone()
    }

    /// Number of events of `kind`.
    pub fn count(&self, kind: &str) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }
}

// ============================================================================
// Waiting
// ============================================================================

/// Polls `condition` in virtual time until it holds.
pub async fn wait_for<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + WAIT_LIMIT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(10)).await;
    }
}

/// Next accepted bridge end.
pub async fn accept(bridges: &mut mpsc::UnboundedReceiver<BridgeEnd>) -> BridgeEnd {
    timeout(WAIT_LIMIT, bridges.recv())
        .await
        .expect("timed out waiting for a socket")
        .expect("connector dropped")
}
