//! Duplex WebSocket channel with fixed-delay reconnect.
//!
//! The [`ConnectionManager`] runs as its own task and cycles forever:
//!
//! ```text
//! Connecting --> Open --> Closed --(sleep reconnect_delay)--> Connecting
//!      \______ failed connect ______/
//! ```
//!
//! Every attempt builds a new socket; a closed handle is never reused.
//! Inbound frames are decoded into [`InboundMessage`]s and forwarded to the
//! client loop as [`ConnectionEvent`]s. Outbound messages queued through
//! a [`ConnectionHandle`] are written while the socket is open and dropped
//! otherwise.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pulse_core::config::ConnectionConfig;
use pulse_types::{InboundMessage, OutboundMessage, decode_inbound};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle state of the duplex channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// A connection attempt is in flight.
    Connecting,
    /// The socket is open.
    Open,
    /// The socket is closed; a retry is scheduled.
    Closed,
}

/// What the connection task reports to the client loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The socket opened. Nothing is sent on open; the server starts pushing.
    Opened,
    /// A decoded inbound message.
    Message(InboundMessage),
    /// The socket closed or the attempt failed.
    Closed {
        /// Attempt number (from 1) that just ended.
        attempt: u64,
    },
}

/// Outbound side of the channel as seen by the client loop.
pub trait Transport: Send {
    /// Whether the channel is open right now.
    fn is_open(&self) -> bool;

    /// Queue a message for sending. Returns `false` if it was dropped
    /// because the channel is not open or the queue is full.
    fn send(&mut self, message: OutboundMessage) -> bool;
}

/// Why one open session ended.
enum SessionEnd {
    /// The peer closed or the socket failed; reconnect.
    Closed,
    /// Nobody is listening anymore; stop the task.
    Shutdown,
}

/// Owns the reconnect policy for one endpoint.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    url: String,
    reconnect_delay: Duration,
    outbound_buffer: usize,
}

impl ConnectionManager {
    /// Create a manager for `url` (a `ws://` or `wss://` endpoint).
    pub fn new(url: impl Into<String>, config: &ConnectionConfig) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: config.reconnect_delay(),
            outbound_buffer: config.outbound_buffer.max(1),
        }
    }

    /// Endpoint this manager connects to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start the connection task.
    ///
    /// Events are posted to `events` until the returned handle is dropped
    /// or the receiver goes away.
    pub fn spawn(self, events: mpsc::UnboundedSender<ConnectionEvent>) -> ConnectionHandle {
        let (outbound_tx, outbound_rx) = mpsc::channel(self.outbound_buffer);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let task = tokio::spawn(self.run(events, outbound_rx, status_tx));
        ConnectionHandle {
            outbound: outbound_tx,
            status: status_rx,
            task,
        }
    }

    async fn run(
        self,
        events: mpsc::UnboundedSender<ConnectionEvent>,
        mut outbound: mpsc::Receiver<OutboundMessage>,
        status: watch::Sender<ConnectionStatus>,
    ) {
        let mut attempt: u64 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let _ = status.send(ConnectionStatus::Connecting);
            debug!(url = %self.url, attempt, "connecting");

            match connect_async(self.url.as_str()).await {
                Ok((ws, _)) => {
                    let _ = status.send(ConnectionStatus::Open);
                    info!(url = %self.url, attempt, "connection open");
                    if events.send(ConnectionEvent::Opened).is_err() {
                        return;
                    }
                    if let SessionEnd::Shutdown = pump(ws, &events, &mut outbound).await {
                        return;
                    }
                }
                Err(e) => {
                    warn!(url = %self.url, attempt, error = %e, "connection attempt failed");
                }
            }

            let _ = status.send(ConnectionStatus::Closed);
            // Anything queued for the old socket is moot.
            while outbound.try_recv().is_ok() {}
            info!(
                attempt,
                delay_ms = self.reconnect_delay.as_millis(),
                "connection closed, reconnecting"
            );
            if events.send(ConnectionEvent::Closed { attempt }).is_err() {
                return;
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }
}

/// Shuttle frames between one open socket and the client loop.
async fn pump(
    ws: WsStream,
    events: &mpsc::UnboundedSender<ConnectionEvent>,
    outbound: &mut mpsc::Receiver<OutboundMessage>,
) -> SessionEnd {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match decode_inbound(text.as_str()) {
                        Ok(Some(message)) => {
                            if events.send(ConnectionEvent::Message(message)).is_err() {
                                return SessionEnd::Shutdown;
                            }
                        }
                        Ok(None) => debug!(frame = %text.as_str(), "unknown message type ignored"),
                        Err(e) => warn!(error = %e, "dropping undecodable frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Closed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "socket error");
                        return SessionEnd::Closed;
                    }
                }
            }
            queued = outbound.recv() => {
                let Some(message) = queued else {
                    return SessionEnd::Shutdown;
                };
                let text = match message.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "failed to encode outbound message");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!(error = %e, "send failed");
                    return SessionEnd::Closed;
                }
            }
        }
    }
}

/// Client-side handle to a running connection task.
///
/// Dropping the handle stops the task and closes the socket.
#[derive(Debug)]
pub struct ConnectionHandle {
    outbound: mpsc::Sender<OutboundMessage>,
    status: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Current lifecycle state.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }
}

impl Transport for ConnectionHandle {
    fn is_open(&self) -> bool {
        self.status() == ConnectionStatus::Open
    }

    fn send(&mut self, message: OutboundMessage) -> bool {
        if !self.is_open() {
            debug!("channel not open, outbound message dropped");
            return false;
        }
        match self.outbound.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "outbound queue rejected message");
                false
            }
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn refused_connection_retries_after_fixed_delay() {
        // Grab a free port and release it so the connect is refused.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ConnectionConfig {
            reconnect_delay_ms: 1000,
            outbound_buffer: 4,
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ConnectionManager::new(format!("ws://{addr}/ws"), &config).spawn(tx);

        assert_eq!(rx.recv().await.unwrap(), ConnectionEvent::Closed { attempt: 1 });
        let closed_at = tokio::time::Instant::now();
        assert_eq!(rx.recv().await.unwrap(), ConnectionEvent::Closed { attempt: 2 });
        assert!(closed_at.elapsed() >= Duration::from_secs(1));
        assert_eq!(rx.recv().await.unwrap(), ConnectionEvent::Closed { attempt: 3 });
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn send_while_closed_is_dropped() {
        let config = ConnectionConfig::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut handle =
            ConnectionManager::new("ws://127.0.0.1:9/ws", &config).spawn(tx);
        assert!(!handle.send(OutboundMessage::Emoji(pulse_types::EntityId::from("🎉;x"))));
    }
}
