//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! The WebSocket upgrade runs on its own task, bounded by `write_wait`,
//! and finished connections are handed back to [`Transport::accept`] over
//! a channel. A peer that stalls mid-handshake never holds up the others.
//!
//! Each upgraded socket is split into a read half and a write half, each
//! behind its own lock. The read loop parks on the read half while any
//! number of dispatch tasks take turns on the write half.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::{Connection, ConnectionId, Transport, TransportConfig, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    config: TransportConfig,
    upgraded_tx: mpsc::UnboundedSender<WebSocketConnection>,
    upgraded: mpsc::UnboundedReceiver<WebSocketConnection>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport with default tuning.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_config(addr, TransportConfig::default()).await
    }

    /// Binds a new WebSocket transport with the given tuning.
    pub async fn bind_with_config(
        addr: &str,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        let (upgraded_tx, upgraded) = mpsc::unbounded_channel();
        Ok(Self {
            listener,
            config,
            upgraded_tx,
            upgraded,
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns the tuning handed to every accepted connection.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        loop {
            tokio::select! {
                Some(conn) = self.upgraded.recv() => return Ok(conn),
                accepted = self.listener.accept() => {
                    let (stream, remote_addr) =
                        accepted.map_err(TransportError::AcceptFailed)?;
                    tokio::spawn(upgrade(
                        stream,
                        remote_addr,
                        self.config.clone(),
                        self.upgraded_tx.clone(),
                    ));
                }
            }
        }
    }
}

/// Runs the WebSocket handshake for one TCP stream and hands the result
/// to the accept loop. Failed or stalled handshakes are dropped.
async fn upgrade(
    stream: TcpStream,
    remote_addr: SocketAddr,
    config: TransportConfig,
    upgraded: mpsc::UnboundedSender<WebSocketConnection>,
) {
    let local_addr = stream.local_addr().ok();
    // Frames and whole messages share one limit; no fragment may exceed
    // what the reassembled message is allowed to be.
    let ws_config = WebSocketConfig::default()
        .max_message_size(Some(config.max_message_size))
        .max_frame_size(Some(config.max_message_size));

    let handshake =
        tokio_tungstenite::accept_async_with_config(stream, Some(ws_config));
    let ws = match tokio::time::timeout(config.write_wait, handshake).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            tracing::debug!(%remote_addr, error = %e, "WebSocket handshake failed");
            return;
        }
        Err(_) => {
            tracing::debug!(%remote_addr, wait = ?config.write_wait, "WebSocket handshake timed out");
            return;
        }
    };

    let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    tracing::debug!(%id, %remote_addr, "accepted WebSocket connection");

    let (sink, source) = ws.split();
    let conn = WebSocketConnection {
        id,
        local_addr,
        remote_addr: Some(remote_addr),
        config,
        sink: Mutex::new(sink),
        source: Mutex::new(source),
    };
    if upgraded.send(conn).is_err() {
        tracing::debug!(%id, "transport dropped before accept");
    }
}

/// A single WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    local_addr: Option<SocketAddr>,
    remote_addr: Option<SocketAddr>,
    config: TransportConfig,
    sink: Mutex<SplitSink<WsStream, Message>>,
    source: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    /// Returns the tuning this connection runs with.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Writes one frame, giving up after `write_wait`.
    async fn write(&self, msg: Message) -> Result<(), TransportError> {
        let write_wait = self.config.write_wait;
        let write = async {
            self.sink.lock().await.send(msg).await.map_err(|e| match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed => {
                    TransportError::ConnectionClosed(e.to_string())
                }
                e => TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                )),
            })
        };
        tokio::time::timeout(write_wait, write)
            .await
            .map_err(|_| TransportError::WriteTimeout(write_wait))?
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.write(Message::Binary(data.to_vec().into())).await
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let pong_wait = self.config.pong_wait;
        let mut source = self.source.lock().await;
        loop {
            // A fresh deadline per frame: pongs keep an idle peer alive.
            let msg = tokio::time::timeout(pong_wait, source.next())
                .await
                .map_err(|_| TransportError::IdleTimeout(pong_wait))?;
            match msg {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(WsError::Capacity(CapacityError::MessageTooLong {
                    size,
                    max_size,
                }))) => {
                    return Err(TransportError::MessageTooLarge {
                        size,
                        max: max_size,
                    });
                }
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        self.write(Message::Ping(Vec::new().into())).await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let mut sink = self.sink.lock().await;
        SinkExt::close(&mut *sink).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }
}
