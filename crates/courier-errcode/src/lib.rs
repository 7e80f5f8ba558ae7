//! Hierarchical error codes for Courier.
//!
//! Every failure that reaches a client is described by an [`ErrCode`]: one
//! integer packing a category (think HTTP status), a platform and a
//! specific code, plus a short description. Inside the server, failures
//! travel as [`CodeError`]s, which pair a code with the underlying cause
//! and a stack trace captured once.
//!
//! ```text
//! handler error ──→ as_code_error? ──yes──→ code + message pass through
//!                         │
//!                         no
//!                         ▼
//!          take_code_priority(classifier, ERR_INTERNAL_SERVER)
//! ```

mod code;
mod error;

pub use code::{
    CC_BAD_REQUEST, CC_FORBIDDEN, CC_INTERNAL_SERVER, CC_NOT_FOUND,
    CC_NOT_IMPLEMENTED, CC_UNAUTHORIZED, CC_UNKNOWN, CodeCombiner,
    CodeSystem, Combiner323, ERR_INTERNAL_SERVER, ERR_PARAM, ErrCode,
    separate_code, take_code_priority,
};
pub use error::{
    BoxError, CodeError, Report, as_code_error, is_code_error,
};
