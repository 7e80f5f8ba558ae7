//! # Courier
//!
//! Header-routed request/response dispatch over WebSocket.
//!
//! Clients send JSON envelopes naming an operation by `version`/`action`.
//! Courier finds the handler registered for that pair, decodes the
//! envelope's `data` into the handler's request type, runs it on its own
//! task, and writes back one response envelope with either the handler's
//! result or a packed error code.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct EchoReq {
//!     #[serde(rename = "msgReq")]
//!     msg_req: String,
//! }
//!
//! #[derive(Serialize)]
//! struct EchoResp {
//!     #[serde(rename = "msgResp")]
//!     msg_resp: String,
//! }
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     type Request = EchoReq;
//!     type Response = EchoResp;
//!
//!     async fn handle(
//!         &self,
//!         _ctx: &ConnectionContext,
//!         _header: &mut Header,
//!         req: EchoReq,
//!     ) -> Result<EchoResp, BoxError> {
//!         Ok(EchoResp { msg_resp: req.msg_req.to_uppercase() })
//!     }
//! }
//!
//! # async fn run() -> Result<(), CourierError> {
//! let server = Server::builder()
//!     .bind("0.0.0.0:8080")
//!     .register(MessageHandler::new(Header::route("v1", "echo"), Echo))
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! ## Crates
//!
//! - `courier-errcode`: [`ErrCode`], [`CodeError`] and the code packing
//! - `courier-protocol`: [`Header`], envelopes and the JSON codec
//! - `courier-transport`: the session contract and its WebSocket
//!   implementation

mod connection;
mod context;
mod dispatch;
mod error;
mod handler;
mod registry;
mod response;
mod server;

pub use context::ConnectionContext;
pub use dispatch::{Dispatcher, ErrorSink};
pub use error::{CourierError, DispatchError};
pub use handler::{ErasedHandler, Handler, MessageHandler};
pub use registry::Registry;
pub use response::{Classifier, DetailsLevel, ResponseFormatter};
pub use server::{ConnectHook, Server, ServerBuilder};

pub use courier_errcode::{
    BoxError, CodeError, ERR_INTERNAL_SERVER, ERR_PARAM, ErrCode,
    with_code,
};
pub use courier_protocol::{Header, Request, Response};
pub use courier_transport::{ConnectionId, TransportConfig};

/// Everything a handler author usually needs.
pub mod prelude {
    pub use crate::{
        BoxError, CodeError, ConnectionContext, CourierError, DetailsLevel,
        ERR_INTERNAL_SERVER, ERR_PARAM, ErrCode, Handler, Header,
        MessageHandler, Server, TransportConfig, with_code,
    };
}
