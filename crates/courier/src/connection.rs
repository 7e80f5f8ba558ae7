//! Per-connection loop: connect hook, keep-alive, message fan-out.
//!
//! Each accepted connection gets its own Tokio task running this loop.
//! The flow is:
//!   1. Build the connection context and run the `on_connect` hook
//!   2. Start the keep-alive pinger
//!   3. Loop: receive a payload → spawn a dispatch task for it
//!
//! Dispatch tasks are not awaited by the loop, so a slow handler never
//! holds up the next message. Their responses may go out in any order.

use std::sync::Arc;
use std::time::Duration;

use courier_transport::Connection;
use tokio::task::JoinHandle;

use crate::server::ServerState;
use crate::{ConnectionContext, CourierError};

/// Pings the peer every `ping_period` until dropped.
///
/// Dropping aborts the task, so the pinger never outlives the loop that
/// owns it.
struct KeepAlive(JoinHandle<()>);

impl KeepAlive {
    /// Returns `None` for a zero period, which disables pinging.
    fn start<C: Connection>(conn: Arc<C>, period: Duration) -> Option<Self> {
        if period.is_zero() {
            return None;
        }
        Some(Self(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = conn.ping().await {
                    tracing::debug!(conn_id = %conn.id(), error = %e, "ping failed");
                    break;
                }
            }
        })))
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Connection>(
    conn: C,
    state: Arc<ServerState>,
) -> Result<(), CourierError> {
    let conn = Arc::new(conn);
    let ctx = ConnectionContext::for_connection(conn.as_ref());
    let conn_id = ctx.id();
    tracing::debug!(%conn_id, remote_addr = ?ctx.remote_addr(), "handling new connection");

    // --- Step 1: Connect hook ---
    if let Some(on_connect) = &state.on_connect {
        if let Err(e) = on_connect(&ctx) {
            tracing::info!(%conn_id, error = %e, "connection rejected");
            if let Err(e) = conn.close().await {
                tracing::debug!(%conn_id, error = %e, "close failed");
            }
            return Err(CourierError::Rejected(e));
        }
    }

    // --- Step 2: Keep-alive ---
    let _keep_alive = KeepAlive::start(Arc::clone(&conn), state.ping_period);

    // --- Step 3: Message loop ---
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                if let Err(e) = conn.close().await {
                    tracing::debug!(%conn_id, error = %e, "close failed");
                }
                break;
            }
        };

        let conn = Arc::clone(&conn);
        let ctx = ctx.clone();
        let dispatcher = Arc::clone(&state.dispatcher);
        tokio::spawn(async move {
            dispatcher.handle_message(conn.as_ref(), &ctx, &data).await;
        });
    }

    // _keep_alive drops here → pinger stops.
    Ok(())
}
