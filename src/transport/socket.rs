//! Physical socket abstraction.
//!
//! A [`Connector`] opens one socket to the bridge and hands back a
//! [`Socket`]: a sink of outgoing text frames and a stream of incoming
//! ones. [`WsConnector`] is the tungstenite implementation; tests plug in
//! in-memory connectors.

// ============================================================================
// Imports
// ============================================================================

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future;
use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on the TCP + WebSocket handshake.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Types
// ============================================================================

/// Outgoing half of a socket.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Incoming half of a socket. The stream ends when the socket closes; an
/// `Err` item is a transport failure.
pub type FrameStream = BoxStream<'static, Result<String>>;

// ============================================================================
// Socket
// ============================================================================

/// An open socket to the bridge.
pub struct Socket {
    /// Outgoing text frames.
    pub sink: FrameSink,
    /// Incoming text frames.
    pub stream: FrameStream,
}

impl Socket {
    /// Creates a socket from its halves.
    #[inline]
    #[must_use]
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Opens sockets to the bridge.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens one socket to `url`.
    async fn connect(&self, url: &Url) -> Result<Socket>;
}

// ============================================================================
// WsConnector
// ============================================================================

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    /// Handshake bound.
    connect_timeout: Duration,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl WsConnector {
    /// Creates a connector with the default handshake timeout.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Socket> {
        let (ws_stream, response) = timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                Error::connection(format!(
                    "handshake with {url} timed out after {}ms",
                    self.connect_timeout.as_millis()
                ))
            })??;

        debug!(url = %url, status = %response.status(), "WebSocket handshake completed");

        let (ws_write, ws_read) = ws_stream.split();

        let sink = ws_write.with(|text: String| {
            future::ready(Ok::<_, Error>(Message::Text(text.into())))
        });

        let stream = ws_read
            .take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)))))
            .filter_map(|message| {
                future::ready(match message {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Err(e) => Some(Err(Error::from(e))),
                    // Ignore Binary, Ping, Pong
                    Ok(_) => None,
                })
            });

        Ok(Socket::new(Box::pin(sink), stream.boxed()))
    }
}

// ============================================================================
// Tests
// ============================================================================
