//! `Server` builder and accept loop.
//!
//! This is the entry point for running a Courier server. It ties together
//! all the layers: transport → dispatcher → registry → handler.

use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use courier_errcode::{BoxError, ErrCode};
use courier_transport::{Transport, TransportConfig, WebSocketTransport};

use crate::connection::handle_connection;
use crate::dispatch::Dispatcher;
use crate::handler::{ErasedHandler, Handler, MessageHandler};
use crate::response::DetailsLevel;
use crate::{ConnectionContext, CourierError};

/// Runs once per accepted connection, before its first message is read.
///
/// Use it to seed context values. Returning an error closes the
/// connection.
pub type ConnectHook =
    Arc<dyn Fn(&ConnectionContext) -> Result<(), BoxError> + Send + Sync>;

/// Shared server state passed to each connection task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
pub(crate) struct ServerState {
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) on_connect: Option<ConnectHook>,
    pub(crate) ping_period: Duration,
}

/// Builder for configuring and starting a Courier server.
///
/// # Example
///
/// ```rust,ignore
/// use courier::prelude::*;
///
/// let server = Server::builder()
///     .bind("0.0.0.0:8080")
///     .details(DetailsLevel::Normal)
///     .register(MessageHandler::new(Header::route("v1", "echo"), Echo))
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct ServerBuilder {
    bind_addr: String,
    transport_config: TransportConfig,
    dispatcher: Dispatcher,
    on_connect: Option<ConnectHook>,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            transport_config: TransportConfig::default(),
            dispatcher: Dispatcher::new(),
            on_connect: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets write/idle timeouts, ping period and message size limit.
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    /// Sets how much error text failed responses carry.
    pub fn details(mut self, details: DetailsLevel) -> Self {
        self.dispatcher = self.dispatcher.with_details(details);
        self
    }

    /// Sets the classifier for handler errors that carry no code.
    pub fn classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> Option<ErrCode> + Send + Sync + 'static,
    {
        self.dispatcher = self.dispatcher.with_classifier(classifier);
        self
    }

    /// Sets the sink for failures that cannot reach the client.
    pub fn error_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&ConnectionContext, fmt::Arguments<'_>) + Send + Sync + 'static,
    {
        self.dispatcher = self.dispatcher.with_error_sink(sink);
        self
    }

    /// Sets the hook run for every new connection.
    pub fn on_connect<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ConnectionContext) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(hook));
        self
    }

    /// Registers a handler. A later handler for the same routing key
    /// replaces an earlier one.
    pub fn register<H: Handler>(self, handler: MessageHandler<H>) -> Self {
        self.dispatcher.register(handler);
        self
    }

    /// Binds the listener.
    pub async fn build(self) -> Result<Server, CourierError> {
        let ping_period = self.transport_config.ping_period;
        let transport = WebSocketTransport::bind_with_config(
            &self.bind_addr,
            self.transport_config,
        )
        .await?;

        let state = Arc::new(ServerState {
            dispatcher: Arc::new(self.dispatcher),
            on_connect: self.on_connect,
            ping_period,
        });

        Ok(Server { transport, state })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Courier server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct Server {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl Server {
    /// Creates a new builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The dispatcher shared by all connections.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.state.dispatcher
    }

    /// Registers a handler. Safe to call while the server is running,
    /// through a clone of [`dispatcher()`](Self::dispatcher).
    pub fn register<H: Handler>(
        &self,
        handler: MessageHandler<H>,
    ) -> Option<Arc<dyn ErasedHandler>> {
        self.state.dispatcher.register(handler)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a task for each one. Runs
    /// until the process is terminated.
    pub async fn run(mut self) -> Result<(), CourierError> {
        tracing::info!(
            handlers = self.state.dispatcher.registry().len(),
            "Courier server running"
        );

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
