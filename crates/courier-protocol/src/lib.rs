//! Wire protocol for Courier.
//!
//! This crate defines the "language" that clients and servers speak:
//!
//! - **Header** ([`Header`]) — the loose field map every envelope carries,
//!   and the routing key derived from its `version`/`action`.
//! - **Envelopes** ([`Request`], [`Response`], [`RequestHead`],
//!   [`RequestData`]) — the JSON shapes that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those shapes are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (envelope) → Dispatch (handler)
//! ```

mod codec;
mod envelope;
mod error;
mod header;

pub use codec::{Codec, JsonCodec};
pub use envelope::{
    Request, RequestData, RequestHead, Response, SUCCESS_CODE,
    SUCCESS_MESSAGE,
};
pub use error::ProtocolError;
pub use header::{
    HEADER_FIELD_ACTION, HEADER_FIELD_ID, HEADER_FIELD_VERSION, Header,
};
