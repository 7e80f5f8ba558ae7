//! Request and response envelopes.
//!
//! Inbound:
//!
//! ```text
//! { "header": { "version": "v1", "action": "echo", "id": "7", ... },
//!   "data":   <handler-specific> }
//! ```
//!
//! Outbound:
//!
//! ```text
//! { "header":  <echoed, possibly augmented header>,
//!   "code":    0 | <packed error code>,
//!   "message": "Success" | <registered description>,
//!   "data":    <handler-specific> | null,
//!   "details": <error detail, only when configured> }
//! ```
//!
//! Decoding is split in two: the dispatcher reads a [`RequestHead`] to find
//! the handler, then the handler reads a [`RequestData`] of its own type
//! from the same bytes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Header;

/// `code` of a successful response.
pub const SUCCESS_CODE: u32 = 0;
/// `message` of a successful response.
pub const SUCCESS_MESSAGE: &str = "Success";

/// The part of an inbound envelope needed for routing.
///
/// `data` is skipped; a missing or `null` header decodes as empty.
#[derive(Debug, Default, Deserialize)]
pub struct RequestHead {
    #[serde(default)]
    header: Option<Header>,
}

impl RequestHead {
    pub fn into_header(self) -> Header {
        self.header.unwrap_or_default()
    }
}

/// The `data` field of an inbound envelope, typed by the handler.
///
/// A missing `data` field only decodes when `T` is an `Option`.
#[derive(Debug, Deserialize)]
pub struct RequestData<T> {
    pub data: T,
}

/// A complete inbound envelope, as a client builds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request<T = Value> {
    #[serde(default)]
    pub header: Header,
    pub data: T,
}

impl<T> Request<T> {
    pub fn new(header: Header, data: T) -> Self {
        Self { header, data }
    }
}

/// A complete outbound envelope.
///
/// `data` is `None` (`null` on the wire) for failures. `details` is left
/// off the wire entirely unless the server's detail policy fills it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<T = Value> {
    pub header: Header,
    pub code: u32,
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl<T> Response<T> {
    /// A successful response carrying `data`.
    pub fn success(header: Header, data: Option<T>) -> Self {
        Self {
            header,
            code: SUCCESS_CODE,
            message: SUCCESS_MESSAGE.to_string(),
            data,
            details: None,
        }
    }

    /// A failed response.
    pub fn failure(
        header: Header,
        code: u32,
        message: impl Into<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            header,
            code,
            message: message.into(),
            data: None,
            details,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}
