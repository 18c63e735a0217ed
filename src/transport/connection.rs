//! Socket event loop.
//!
//! Drives one open [`Socket`]: forwards queued outgoing frames and hands
//! every incoming frame to a callback, in receive order, until either side
//! closes.
//!
//! # Event Loop
//!
//! The loop `select!`s between:
//!
//! - Incoming frames from the bridge
//! - Commands from the manager (send frame, close)

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

use super::socket::Socket;

// ============================================================================
// Types
// ============================================================================

/// Commands for the event loop.
#[derive(Debug)]
pub(crate) enum SocketCommand {
    /// Write a text frame.
    Send(String),
    /// Close the socket.
    Close,
}

/// Something the loop observed on the socket.
#[derive(Debug)]
pub(crate) enum SocketEvent {
    /// Text frame received.
    Frame(String),
    /// Transport failure; the loop ends right after.
    Error(Error),
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseReason {
    /// Closed on our request.
    Local,
    /// Remote closed or the stream ended.
    Remote,
    /// Transport failure.
    Failed,
}

// ============================================================================
// SocketLink
// ============================================================================

/// Handle for queueing commands to a running event loop.
#[derive(Debug, Clone)]
pub(crate) struct SocketLink {
    command_tx: mpsc::UnboundedSender<SocketCommand>,
}

impl SocketLink {
    /// Creates a link and the receiver the loop consumes.
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<SocketCommand>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        (Self { command_tx }, command_rx)
    }

    /// Queues a text frame.
    pub(crate) fn send(&self, frame: String) -> Result<()> {
        self.command_tx
            .send(SocketCommand::Send(frame))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Asks the loop to close the socket.
    pub(crate) fn close(&self) {
        let _ = self.command_tx.send(SocketCommand::Close);
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Runs the event loop until the socket closes.
pub(crate) async fn run_event_loop<F>(
    socket: Socket,
    mut command_rx: mpsc::UnboundedReceiver<SocketCommand>,
    mut on_event: F,
) -> CloseReason
where
    F: FnMut(SocketEvent),
{
    let Socket {
        mut sink,
        mut stream,
    } = socket;

    let reason = loop {
        tokio::select! {
            // Incoming frames from the bridge
            frame = stream.next() => {
                match frame {
                    Some(Ok(text)) => {
                        trace!(len = text.len(), "Frame received");
                        on_event(SocketEvent::Frame(text));
                    }

                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        on_event(SocketEvent::Error(e));
                        break CloseReason::Failed;
                    }

                    None => {
                        debug!("WebSocket closed by remote");
                        break CloseReason::Remote;
                    }
                }
            }

            // Commands from the manager
            command = command_rx.recv() => {
                match command {
                    Some(SocketCommand::Send(frame)) => {
                        if let Err(e) = sink.send(frame).await {
                            warn!(error = %e, "Failed to write frame");
                            on_event(SocketEvent::Error(e));
                            break CloseReason::Failed;
                        }
                        trace!("Frame sent");
                    }

                    Some(SocketCommand::Close) | None => {
                        debug!("Close requested");
                        let _ = sink.close().await;
                        break CloseReason::Local;
                    }
                }
            }
        }
    };

    debug!(?reason, "Event loop terminated");
    reason
}

// ============================================================================
// Tests
// ============================================================================
