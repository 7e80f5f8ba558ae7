//! Connection tuning.
//!
//! The dispatch core never reads these values; they only shape how the
//! session layer treats the socket.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Time allowed to write one message to the peer. Also bounds the
/// WebSocket upgrade handshake.
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(10);
/// Time allowed between two inbound frames (pongs included).
pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(60);
/// How often to ping the peer. Must stay below the pong wait.
pub const DEFAULT_PING_PERIOD: Duration = Duration::from_secs(54);
/// Largest inbound message accepted, in bytes. Applies to single frames
/// as well as reassembled messages.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 32 << 20;

/// Per-connection tuning for a [`Transport`](crate::Transport).
///
/// ```rust
/// use std::time::Duration;
/// use courier_transport::TransportConfig;
///
/// let config = TransportConfig {
///     max_message_size: 1 << 20,
///     ..TransportConfig::default()
/// };
/// assert_eq!(config.write_wait, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub write_wait: Duration,
    pub pong_wait: Duration,
    pub ping_period: Duration,
    pub max_message_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            write_wait: DEFAULT_WRITE_WAIT,
            pong_wait: DEFAULT_PONG_WAIT,
            ping_period: DEFAULT_PING_PERIOD,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}
