//! Session transport for Courier.
//!
//! Provides the [`Transport`] and [`Connection`] traits the dispatch core
//! talks to. A connection delivers one inbound payload at a time and accepts
//! outbound payloads; writes to one connection are serialized by the
//! implementation, so many tasks may call [`Connection::send`] at once.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod config;
mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use config::{
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PING_PERIOD, DEFAULT_PONG_WAIT,
    DEFAULT_WRITE_WAIT, TransportConfig,
};
pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive bytes.
///
/// The futures are `Send` so dispatch tasks spawned on the multi-threaded
/// runtime can hold them.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends data to the remote peer.
    ///
    /// Concurrent calls are serialized; each payload goes out whole.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Sends a keep-alive probe. Transports without one do nothing.
    fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async { Ok(()) }
    }

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// The address of our end of the connection, if it has one.
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    /// The address of the peer, if it has one.
    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }
}
