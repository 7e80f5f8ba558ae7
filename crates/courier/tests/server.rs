//! Integration tests for the Courier server, dispatcher, and full
//! request/response flow over a real WebSocket.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use courier::prelude::*;
use courier::{Response, ServerBuilder};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Test handlers
// =========================================================================

#[derive(Deserialize)]
struct EchoReq {
    #[serde(rename = "msgReq")]
    msg_req: String,
}

#[derive(Serialize)]
struct EchoResp {
    #[serde(rename = "msgResp")]
    msg_resp: String,
    nsid: Option<String>,
}

/// Upper-cases `msgReq`, tags the header, counts calls.
struct Echo {
    calls: Arc<AtomicUsize>,
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
        self.calls.fetch_add(1, Ordering::SeqCst);
        header.set("A", "aa");
        Ok(EchoResp {
            msg_resp: req.msg_req.to_uppercase(),
            nsid: ctx.value::<String>("nsid").map(|s| s.to_string()),
        })
    }
}

/// Answers with a fixed name, to tell registrations apart.
struct Named(&'static str);

impl Handler for Named {
    type Request = Value;
    type Response = &'static str;

    async fn handle(
        &self,
        _ctx: &ConnectionContext,
        _header: &mut Header,
        _req: Value,
    ) -> Result<&'static str, BoxError> {
        Ok(self.0)
    }
}

#[derive(Deserialize)]
struct SleepReq {
    ms: u64,
}

struct Sleep;

impl Handler for Sleep {
    type Request = SleepReq;
    type Response = u64;

    async fn handle(
        &self,
        _ctx: &ConnectionContext,
        _header: &mut Header,
        req: SleepReq,
    ) -> Result<u64, BoxError> {
        tokio::time::sleep(Duration::from_millis(req.ms)).await;
        Ok(req.ms)
    }
}

struct Boom;

impl Handler for Boom {
    type Request = Value;
    type Response = Value;

    async fn handle(
        &self,
        _ctx: &ConnectionContext,
        _header: &mut Header,
        _req: Value,
    ) -> Result<Value, BoxError> {
        panic!("boom")
    }
}

/// Fails with an error that carries no code.
struct Disk;

impl Handler for Disk {
    type Request = Value;
    type Response = Value;

    async fn handle(
        &self,
        _ctx: &ConnectionContext,
        _header: &mut Header,
        _req: Value,
    ) -> Result<Value, BoxError> {
        Err(Box::new(std::io::Error::other("disk gone")))
    }
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

fn echo(calls: &Arc<AtomicUsize>) -> MessageHandler<Echo> {
    MessageHandler::new(
        Header::route("v1", "echo"),
        Echo {
            calls: Arc::clone(calls),
        },
    )
}

/// Starts a server on a random port and returns the address.
async fn start_server(builder: ServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, envelope: Value) {
    let text = serde_json::to_string(&envelope).expect("encode");
    ws.send(Message::Text(text.into())).await.expect("send");
}

/// Reads frames until a data frame arrives and decodes it.
async fn recv_raw(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("response in time")
            .expect("stream open")
            .expect("frame");
        if msg.is_binary() || msg.is_text() {
            return serde_json::from_slice(&msg.into_data()).expect("decode");
        }
    }
}

async fn recv(ws: &mut ClientWs) -> Response {
    serde_json::from_value(recv_raw(ws).await).expect("response envelope")
}

async fn call(ws: &mut ClientWs, envelope: Value) -> Response {
    send(ws, envelope).await;
    recv(ws).await
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_echo_round_trip() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = start_server(Server::builder().register(echo(&calls))).await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        json!({"header": {"version": "v1", "action": "echo", "id": "1"}, "data": {"msgReq": "hi"}}),
    )
    .await;
    let raw = recv_raw(&mut ws).await;

    assert_eq!(raw["code"], json!(0));
    assert_eq!(raw["message"], json!("Success"));
    assert_eq!(raw["data"]["msgResp"], json!("HI"));
    assert_eq!(raw["header"]["version"], json!("v1"));
    assert_eq!(raw["header"]["action"], json!("echo"));
    assert_eq!(raw["header"]["id"], json!("1"));
    assert_eq!(raw["header"]["A"], json!("aa"));
    assert!(raw.get("details").is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_route_without_details() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = start_server(Server::builder().register(echo(&calls))).await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"header": {"action": "missing"}, "data": {}})).await;
    let raw = recv_raw(&mut ws).await;

    assert_eq!(raw["code"], json!(ERR_PARAM.code()));
    assert_eq!(raw["message"], json!("ErrParam"));
    assert_eq!(raw["header"]["action"], json!("missing"));
    assert!(raw.get("details").is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_route_details_name_the_key() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = start_server(
        Server::builder()
            .details(DetailsLevel::Normal)
            .register(echo(&calls)),
    )
    .await;
    let mut ws = connect(&addr).await;

    let resp = call(
        &mut ws,
        json!({"header": {"version": "v9", "action": "echo"}, "data": {"msgReq": "hi"}}),
    )
    .await;

    assert_ne!(resp.code, 0);
    assert!(resp.details.unwrap().contains("v9/echo"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_envelope() {
    let addr = start_server(Server::builder()).await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Text("{not json".to_string().into())).await.expect("send");
    let resp = recv(&mut ws).await;
    assert_eq!(resp.code, ERR_PARAM.code());
    assert!(resp.header.is_empty());
}

#[tokio::test]
async fn test_undecodable_data_skips_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = start_server(Server::builder().register(echo(&calls))).await;
    let mut ws = connect(&addr).await;

    let resp = call(
        &mut ws,
        json!({"header": {"version": "v1", "action": "echo"}, "data": {"msgReq": 42}}),
    )
    .await;

    assert_eq!(resp.code, ERR_PARAM.code());
    assert_eq!(resp.data, None);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_panicking_handler_yields_one_error_envelope() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = start_server(
        Server::builder()
            .register(MessageHandler::new(Header::route("v1", "boom"), Boom))
            .register(echo(&calls)),
    )
    .await;
    let mut ws = connect(&addr).await;

    let resp = call(
        &mut ws,
        json!({"header": {"version": "v1", "action": "boom"}, "data": null}),
    )
    .await;
    assert_eq!(resp.code, ERR_INTERNAL_SERVER.code());
    assert_eq!(resp.message, "ErrInternalServer");

    // Same connection keeps working, and nothing else was sent for the
    // panicking request.
    let resp = call(
        &mut ws,
        json!({"header": {"version": "v1", "action": "echo"}, "data": {"msgReq": "still here"}}),
    )
    .await;
    assert!(resp.is_success());
    assert_eq!(resp.data.unwrap()["msgResp"], json!("STILL HERE"));
}

#[tokio::test]
async fn test_later_registration_wins() {
    let addr = start_server(
        Server::builder()
            .register(MessageHandler::new(Header::route("v1", "who"), Named("first")))
            .register(MessageHandler::new(Header::route("v1", "who"), Named("second"))),
    )
    .await;
    let mut ws = connect(&addr).await;

    for _ in 0..3 {
        let resp = call(
            &mut ws,
            json!({"header": {"version": "v1", "action": "who"}, "data": {}}),
        )
        .await;
        assert_eq!(resp.data, Some(json!("second")));
    }
}

#[tokio::test]
async fn test_register_while_running() {
    let server = Server::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("local addr").to_string();
    let dispatcher = Arc::clone(server.dispatcher());
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    let mut ws = connect(&addr).await;

    let envelope = json!({"header": {"action": "late"}, "data": null});
    let resp = call(&mut ws, envelope.clone()).await;
    assert_eq!(resp.code, ERR_PARAM.code());

    dispatcher.register(MessageHandler::new(Header::route("", "late"), Named("here")));
    let resp = call(&mut ws, envelope).await;
    assert_eq!(resp.data, Some(json!("here")));
}

#[tokio::test]
async fn test_details_levels_over_the_wire() {
    let route = |level: DetailsLevel| async move {
        let addr = start_server(
            Server::builder()
                .details(level)
                .register(MessageHandler::new(Header::route("v1", "disk"), Disk)),
        )
        .await;
        let mut ws = connect(&addr).await;
        call(
            &mut ws,
            json!({"header": {"version": "v1", "action": "disk"}, "data": null}),
        )
        .await
    };

    let none = route(DetailsLevel::None).await;
    assert_eq!(none.code, 50000000);
    assert_eq!(none.details, None);

    let normal = route(DetailsLevel::Normal).await;
    assert_eq!(normal.details.as_deref(), Some("50000000: ErrInternalServer"));

    let with_cause = route(DetailsLevel::WithCause).await;
    assert_eq!(
        with_cause.details.as_deref(),
        Some("50000000: ErrInternalServer:disk gone")
    );

    let full = route(DetailsLevel::Full).await.details.unwrap();
    assert!(full.contains("caused by: disk gone"));
    assert!(full.contains("stack backtrace:"));
}

#[tokio::test]
async fn test_classifier_decides_uncoded_errors() {
    let storage = ErrCode::new(503, 2, 7, "ErrStorage");
    let code = storage.clone();
    let addr = start_server(
        Server::builder()
            .classifier(move |err| {
                err.downcast_ref::<std::io::Error>().map(|_| code.clone())
            })
            .register(MessageHandler::new(Header::route("v1", "disk"), Disk)),
    )
    .await;
    let mut ws = connect(&addr).await;

    let resp = call(
        &mut ws,
        json!({"header": {"version": "v1", "action": "disk"}, "data": null}),
    )
    .await;
    assert_eq!(resp.code, storage.code());
    assert_eq!(resp.code, 50302007);
    assert_eq!(resp.message, "ErrStorage");
}

#[tokio::test]
async fn test_on_connect_seeds_context() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = start_server(
        Server::builder()
            .on_connect(|ctx| {
                ctx.with_value("nsid", format!("ns-{}", ctx.id().into_inner()));
                Ok(())
            })
            .register(echo(&calls)),
    )
    .await;
    let mut ws = connect(&addr).await;

    let resp = call(
        &mut ws,
        json!({"header": {"version": "v1", "action": "echo"}, "data": {"msgReq": "x"}}),
    )
    .await;
    let nsid = resp.data.unwrap()["nsid"].as_str().unwrap().to_string();
    assert!(nsid.starts_with("ns-"));
}

#[tokio::test]
async fn test_on_connect_rejection_closes() {
    let addr = start_server(Server::builder().on_connect(|_ctx| Err("banned".into()))).await;
    let mut ws = connect(&addr).await;

    let next = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("close in time");
    match next {
        None | Some(Ok(Message::Close(_))) | Some(Err(_)) => {}
        Some(Ok(other)) => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_handler_does_not_block_connection() {
    let addr = start_server(
        Server::builder().register(MessageHandler::new(Header::route("v1", "sleep"), Sleep)),
    )
    .await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        json!({"header": {"version": "v1", "action": "sleep", "id": "slow"}, "data": {"ms": 300}}),
    )
    .await;
    send(
        &mut ws,
        json!({"header": {"version": "v1", "action": "sleep", "id": "fast"}, "data": {"ms": 0}}),
    )
    .await;

    let first = recv(&mut ws).await;
    let second = recv(&mut ws).await;
    assert_eq!(first.header.id(), "fast");
    assert_eq!(second.header.id(), "slow");
    assert_eq!(second.data, Some(json!(300)));
}
