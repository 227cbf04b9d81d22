//! Transport seam between the connection manager and the wire.
//!
//! The [`ConnectionManager`](super::connection_manager::ConnectionManager)
//! only knows how to ask a [`Connector`] for a [`Transport`] and how to push
//! text frames through it.  Production code plugs in [`WsConnector`], which
//! speaks WebSocket via `tokio-tungstenite`; tests plug in the scripted
//! connector from [`super::mock`].

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, trace};

/// Failure to open a connection.  Every cause is treated the same way: the
/// peer is currently unreachable and a retry is scheduled.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The attempt did not complete within the connect timeout.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// Refused, unresolvable, handshake rejected, malformed URL, ...
    #[error("could not connect to {url}: {reason}")]
    Failed { url: String, reason: String },
}

/// Failure to write on a connection assumed to be live.
#[derive(Debug, Error)]
pub enum SendError {
    /// The underlying write returned an error.
    #[error("write failed: {0}")]
    WriteFailed(String),
    /// The link's writer is gone.
    #[error("link closed")]
    Closed,
}

/// An open, writable connection to the overlay.
#[async_trait]
pub trait Transport: Send {
    /// Writes one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] if the frame could not be written.
    async fn send_text(&mut self, frame: String) -> Result<(), SendError>;

    /// Closes the connection.  Best-effort: failures are swallowed.
    async fn close(&mut self);
}

/// Opens [`Transport`]s to an endpoint URL.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a connection to `url`.
    ///
    /// Timeouts are enforced by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::Failed`] when the peer cannot be reached.
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, ConnectError>;
}

// ── WebSocket implementation ──────────────────────────────────────────────────

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`Connector`] that opens WebSocket connections with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, ConnectError> {
        // `connect_async` resolves the host, opens TCP, and completes the
        // HTTP upgrade handshake.
        let (stream, response) = connect_async(url).await.map_err(|e| ConnectError::Failed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        debug!("WebSocket handshake with {url} completed ({})", response.status());
        Ok(Box::new(WsTransport::new(stream)))
    }
}

/// A live WebSocket connection.
///
/// The relay never expects data from the overlay, but the read half is still
/// drained in the background so control frames (ping, close) are processed
/// and the peer's socket buffer never fills up.
pub struct WsTransport {
    sink: SplitSink<WsStream, WsMessage>,
    drain: JoinHandle<()>,
}

impl WsTransport {
    fn new(stream: WsStream) -> Self {
        let (sink, stream) = stream.split();
        let drain = tokio::spawn(drain_inbound(stream));
        Self { sink, drain }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, frame: String) -> Result<(), SendError> {
        self.sink
            .send(WsMessage::Text(frame))
            .await
            .map_err(|e| SendError::WriteFailed(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.sink.close().await {
            trace!("ignoring WebSocket close error: {e}");
        }
        self.drain.abort();
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.drain.abort();
    }
}

async fn drain_inbound(mut stream: SplitStream<WsStream>) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Close(_)) => {
                debug!("overlay sent close frame");
                break;
            }
            Ok(other) => trace!("ignoring inbound overlay frame: {other:?}"),
            Err(e) => {
                debug!("overlay read side ended: {e}");
                break;
            }
        }
    }
}
