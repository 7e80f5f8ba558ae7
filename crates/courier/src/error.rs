//! Unified error type for the Courier framework.

use courier_errcode::BoxError;
use courier_protocol::ProtocolError;
use courier_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `courier` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
///
/// Handler failures never show up here: they are turned into a response
/// envelope and sent to the client.
#[derive(Debug, thiserror::Error)]
pub enum CourierError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The `on_connect` hook refused the connection.
    #[error("connection rejected: {0}")]
    Rejected(#[source] BoxError),
}

/// Failures raised by the dispatcher itself rather than by a handler.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The handler panicked. Carries the panic message when it was a
    /// string.
    #[error("panic: {0}")]
    Panicked(String),
}
