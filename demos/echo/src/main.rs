use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use courier::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoReq {
    pub msg_req: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoResp {
    pub msg_resp: String,
    pub req_time: String,
    pub local_addr: String,
    pub remote_addr: String,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Echoes `msgReq` with a running request number appended, after a random
/// delay of up to one second.
struct Echo {
    count: AtomicU64,
    max_delay_ms: u64,
}

impl Handler for Echo {
    type Request = EchoReq;
    type Response = EchoResp;

    async fn handle(
        &self,
        ctx: &ConnectionContext,
        header: &mut Header,
        req: EchoReq,
    ) -> Result<EchoResp, BoxError> {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.max_delay_ms > 0 {
            let delay = rand::rng().random_range(0..self.max_delay_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        header.set("A", "aa");
        if let Some(nsid) = ctx.value::<String>("NSID") {
            header.set("NSID", nsid.as_str());
        }

        let addr = |a: Option<std::net::SocketAddr>| {
            a.map(|a| a.to_string()).unwrap_or_default()
        };
        Ok(EchoResp {
            msg_resp: format!("{}{n}", req.msg_req),
            req_time: ctx
                .value::<u128>("ReqTime")
                .map(|t| t.to_string())
                .unwrap_or_default(),
            local_addr: addr(ctx.local_addr()),
            remote_addr: addr(ctx.remote_addr()),
        })
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

fn builder(max_delay_ms: u64) -> courier::ServerBuilder {
    Server::builder()
        .details(DetailsLevel::Full)
        .error_sink(|ctx, args| {
            tracing::error!(conn_id = %ctx.id(), "{args}");
        })
        .on_connect(|ctx| {
            let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
            ctx.with_value("ReqTime", now.as_millis())
                .with_value("NSID", String::from("a"));
            Ok(())
        })
        .register(MessageHandler::new(
            Header::route("v1", "echo"),
            Echo {
                count: AtomicU64::new(0),
                max_delay_ms,
            },
        ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server = builder(1000).bind("0.0.0.0:1234").build().await?;
    tracing::info!(addr = %server.local_addr()?, "echo server listening");

    server.run().await?;
    Ok(())
}
