//! Codec trait and implementations for serializing/deserializing envelopes.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The dispatcher does not care HOW envelopes are serialized — it only
//! needs something that implements the [`Codec`] trait. This is the
//! "strategy pattern": we define an interface, and swap implementations.
//!
//! The wire format today is JSON, so [`JsonCodec`] is the one
//! implementation.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → safe to share between threads (every dispatch task
///   uses the same codec, and Tokio may run them on any worker thread).
/// - `'static` → the codec doesn't borrow temporary data. It lives as
///   long as the server.
///
/// ## Generic methods
///
/// `encode<T: Serialize>` and `decode<T: DeserializeOwned>` work with ANY
/// type `T` implementing the right serde trait. That is what lets one
/// codec decode just the header of an envelope first, and later decode
/// the `data` field into whatever type the matched handler asked for.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use courier_protocol::{Codec, Header, JsonCodec, RequestHead};
///
/// let codec = JsonCodec;
///
/// let bytes = br#"{"header":{"version":"v1","action":"echo"},"data":{"x":1}}"#;
///
/// // Only the header is decoded; `data` is left for the handler.
/// let head: RequestHead = codec.decode(bytes).unwrap();
/// assert_eq!(head.into_header().key(), "v1/echo");
///
/// let out = codec.encode(&Header::route("v1", "echo")).unwrap();
/// assert_eq!(out, br#"{"action":"echo","version":"v1"}"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
