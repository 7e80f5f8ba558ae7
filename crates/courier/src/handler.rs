//! Typed handlers and their type-erased form.
//!
//! Callers implement [`Handler`] with their own request and response
//! types. The registry cannot store handlers of different types in one
//! map, so each one is wrapped in a [`MessageHandler`], which knows the
//! handler's concrete types and exposes only the narrow, object-safe
//! [`ErasedHandler`] contract: "here is the routing header I answer to"
//! and "decode these bytes and run".
//!
//! ```text
//! Handler<Request = EchoReq, Response = EchoResp>
//!         │  MessageHandler::new(Header::route("v1", "echo"), h)
//!         ▼
//! Arc<dyn ErasedHandler>   ← what the registry stores
//! ```

use std::future::Future;

use courier_errcode::{BoxError, ERR_PARAM, with_code};
use courier_protocol::{Codec, Header, JsonCodec, ProtocolError, RequestData};
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ConnectionContext;

/// A typed request handler.
///
/// ## Associated types
///
/// - `Request` → decoded from the envelope's `data` field. If decoding
///   fails the client gets an `ERR_PARAM` response and `handle` is never
///   called.
/// - `Response` → serialized into the response's `data` field.
///
/// ## The header
///
/// `header` is the request header and becomes the response header.
/// Fields set or removed here show up in the reply.
///
/// ## Errors
///
/// Return any error. A [`CodeError`](courier_errcode::CodeError) anywhere
/// in its source chain decides the response code; anything else goes
/// through the server's classifier and then falls back to
/// `ERR_INTERNAL_SERVER`.
///
/// ## Example
///
/// ```rust
/// use courier::prelude::*;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Deserialize)]
/// struct EchoReq {
///     #[serde(rename = "msgReq")]
///     msg_req: String,
/// }
///
/// #[derive(Serialize)]
/// struct EchoResp {
///     #[serde(rename = "msgResp")]
///     msg_resp: String,
/// }
///
/// struct Echo;
///
/// impl Handler for Echo {
///     type Request = EchoReq;
///     type Response = EchoResp;
///
///     async fn handle(
///         &self,
///         _ctx: &ConnectionContext,
///         _header: &mut Header,
///         req: EchoReq,
///     ) -> Result<EchoResp, BoxError> {
///         Ok(EchoResp { msg_resp: req.msg_req.to_uppercase() })
///     }
/// }
///
/// let handler = MessageHandler::new(Header::route("v1", "echo"), Echo);
/// assert_eq!(handler.header().key(), "v1/echo");
/// ```
pub trait Handler: Send + Sync + 'static {
    type Request: DeserializeOwned + Send + 'static;
    type Response: Serialize + Send + 'static;

    fn handle(
        &self,
        ctx: &ConnectionContext,
        header: &mut Header,
        request: Self::Request,
    ) -> impl Future<Output = Result<Self::Response, BoxError>> + Send;
}

/// The uniform invocation contract the registry stores.
///
/// `call` gets the whole raw envelope; the implementation decodes its own
/// `data` field.
pub trait ErasedHandler: Send + Sync + 'static {
    /// The header this handler was declared with. Its routing key is the
    /// registry key.
    fn header(&self) -> &Header;

    fn call<'a>(
        &'a self,
        ctx: &'a ConnectionContext,
        header: &'a mut Header,
        raw: &'a [u8],
    ) -> BoxFuture<'a, Result<Value, BoxError>>;
}

/// A [`Handler`] paired with the header it answers to.
pub struct MessageHandler<H> {
    header: Header,
    handler: H,
}

impl<H: Handler> MessageHandler<H> {
    pub fn new(header: Header, handler: H) -> Self {
        Self { header, handler }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    async fn invoke(
        &self,
        ctx: &ConnectionContext,
        header: &mut Header,
        raw: &[u8],
    ) -> Result<Value, BoxError> {
        let RequestData { data } = JsonCodec
            .decode::<RequestData<H::Request>>(raw)
            .map_err(|e| with_code!(ERR_PARAM, e, "decode data"))?;
        let response = self.handler.handle(ctx, header, data).await?;
        Ok(serde_json::to_value(response).map_err(ProtocolError::Encode)?)
    }
}

impl<H: Handler> ErasedHandler for MessageHandler<H> {
    fn header(&self) -> &Header {
        &self.header
    }

    fn call<'a>(
        &'a self,
        ctx: &'a ConnectionContext,
        header: &'a mut Header,
        raw: &'a [u8],
    ) -> BoxFuture<'a, Result<Value, BoxError>> {
        Box::pin(self.invoke(ctx, header, raw))
    }
}
