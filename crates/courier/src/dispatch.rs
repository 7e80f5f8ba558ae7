//! Per-message dispatch: decode header → look up → invoke → respond.
//!
//! The dispatcher is stateless across messages. Each inbound payload runs
//! through [`Dispatcher::handle_message`] on its own task, and that task
//! makes exactly one attempt to write exactly one response:
//!
//! 1. Decode only the envelope header. Failure → `ERR_PARAM`.
//! 2. Look the routing key up. Miss → `ERR_PARAM` naming the key.
//! 3. Invoke the handler, which decodes its own `data`.
//! 4. A panic anywhere in 1-3 becomes an ordinary error.
//! 5. Format the envelope, encode it, write it.
//!
//! Failures in step 5 cannot be reported to the client any more. They go
//! to the log and to the optional [`ErrorSink`].

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use courier_errcode::{BoxError, ERR_PARAM, ErrCode, with_code};
use courier_protocol::{Codec, Header, JsonCodec, RequestHead, Response};
use courier_transport::Connection;
use futures_util::FutureExt;
use serde_json::Value;

use crate::error::DispatchError;
use crate::handler::{ErasedHandler, Handler, MessageHandler};
use crate::registry::Registry;
use crate::response::{DetailsLevel, ResponseFormatter};
use crate::ConnectionContext;

/// Receives failures that happen after the response is decided, such as
/// a response that cannot be encoded or written. Never called on the
/// success path.
pub type ErrorSink =
    Arc<dyn Fn(&ConnectionContext, fmt::Arguments<'_>) + Send + Sync>;

/// Routes raw payloads to registered handlers and builds the replies.
///
/// `C` frames envelopes: it decodes the inbound header and encodes the
/// outbound response. Handlers still decode their own `data` as JSON.
#[derive(Default)]
pub struct Dispatcher<C = JsonCodec> {
    registry: Registry,
    formatter: ResponseFormatter,
    error_sink: Option<ErrorSink>,
    codec: C,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Codec> Dispatcher<C> {
    /// Swaps the envelope codec, keeping handlers and settings.
    pub fn with_codec<D: Codec>(self, codec: D) -> Dispatcher<D> {
        Dispatcher {
            registry: self.registry,
            formatter: self.formatter,
            error_sink: self.error_sink,
            codec,
        }
    }

    /// Sets how much error text goes into `details`.
    pub fn with_details(mut self, details: DetailsLevel) -> Self {
        self.formatter = self.formatter.with_details(details);
        self
    }

    /// Sets the classifier consulted for errors that carry no code.
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> Option<ErrCode> + Send + Sync + 'static,
    {
        self.formatter = self.formatter.with_classifier(Arc::new(classifier));
        self
    }

    pub fn with_error_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&ConnectionContext, fmt::Arguments<'_>) + Send + Sync + 'static,
    {
        self.error_sink = Some(Arc::new(sink));
        self
    }

    /// Registers a handler. Returns the handler it replaced, if any.
    pub fn register<H: Handler>(
        &self,
        handler: MessageHandler<H>,
    ) -> Option<Arc<dyn ErasedHandler>> {
        self.registry.register(handler)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn formatter(&self) -> &ResponseFormatter {
        &self.formatter
    }

    /// Runs one payload through routing and the handler and returns the
    /// response envelope. Never panics on behalf of a handler.
    pub async fn dispatch(
        &self,
        ctx: &ConnectionContext,
        raw: &[u8],
    ) -> Response {
        let mut header = Header::new();
        let outcome = AssertUnwindSafe(self.route(ctx, &mut header, raw))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                tracing::error!(conn_id = %ctx.id(), %message, "handler panicked");
                Err(DispatchError::Panicked(message).into())
            });
        self.formatter.format(header, outcome)
    }

    /// Dispatches `raw` and writes the response to `conn`.
    pub async fn handle_message<T: Connection>(
        &self,
        conn: &T,
        ctx: &ConnectionContext,
        raw: &[u8],
    ) {
        let response = self.dispatch(ctx, raw).await;
        let Some(bytes) = self.encode(ctx, response) else {
            return;
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::error!(conn_id = %ctx.id(), error = %e, "response write failed");
            self.report(ctx, format_args!("write response: {e}"));
        }
    }

    async fn route(
        &self,
        ctx: &ConnectionContext,
        header: &mut Header,
        raw: &[u8],
    ) -> Result<Value, BoxError> {
        let head: RequestHead = self
            .codec
            .decode(raw)
            .map_err(|e| with_code!(ERR_PARAM, e, "unmarshal failed"))?;
        *header = head.into_header();

        let key = header.key();
        let Some(handler) = self.registry.lookup(&key) else {
            tracing::debug!(conn_id = %ctx.id(), %key, "unknown route");
            return Err(with_code!(ERR_PARAM; "unknown route {}", key).into());
        };
        tracing::trace!(conn_id = %ctx.id(), %key, "dispatching");
        handler.call(ctx, header, raw).await
    }

    /// Encodes a response. If that fails, encodes an error envelope about
    /// the failure instead; if that fails too, gives up.
    fn encode(
        &self,
        ctx: &ConnectionContext,
        response: Response,
    ) -> Option<Vec<u8>> {
        let err = match self.codec.encode(&response) {
            Ok(bytes) => return Some(bytes),
            Err(e) => e,
        };
        tracing::warn!(conn_id = %ctx.id(), error = %err, "response encode failed");

        let retry = self.formatter.format(response.header, Err(err.into()));
        match self.codec.encode(&retry) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::error!(conn_id = %ctx.id(), error = %e, "error response encode failed");
                self.report(ctx, format_args!("encode response: {e}"));
                None
            }
        }
    }

    fn report(&self, ctx: &ConnectionContext, args: fmt::Arguments<'_>) {
        if let Some(sink) = &self.error_sink {
            sink(ctx, args);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
