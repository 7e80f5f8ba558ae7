//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means bytes could not be turned into an
//! envelope (or back). Routing and handler failures are not protocol
//! errors; they travel as coded errors and end up inside a response.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    ///
    /// For JSON this is rare: it takes a map with non-string keys or a
    /// `Serialize` impl that reports its own error.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, a `header` that is not an object,
    /// or a `data` field that does not match the handler's request type.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
