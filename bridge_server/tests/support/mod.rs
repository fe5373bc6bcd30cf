// Shared helpers for booting a bridge on an ephemeral port and talking to it
// with a real websocket client.
#![allow(dead_code)]

use bridge_server::interface_adapters::sim::{InMemorySimulation, MemoryActor};
use bridge_server::{Bridge, BridgeConfig, BridgeHandle};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Upper bound for any single expected frame.
const FRAME_TIMEOUT: Duration = Duration::from_secs(3);

pub struct TestBridge {
    pub handle: BridgeHandle,
    pub simulation: Arc<InMemorySimulation>,
    pub url: String,
}

// Start a bridge with Alice and Bob present and the simulation attached.
pub async fn start_bridge(config: BridgeConfig) -> TestBridge {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let handle = Bridge::start_on(listener, config)
        .await
        .expect("bridge should start");
    let url = format!("ws://{}", handle.local_addr());

    let simulation = Arc::new(InMemorySimulation::new(Some("1.20.4")));
    simulation.add_actor(MemoryActor::named("Alice", "uuid-alice"));
    simulation.add_actor(MemoryActor::named("Bob", "uuid-bob"));
    handle.attach_simulation(simulation.clone());

    TestBridge {
        handle,
        simulation,
        url,
    }
}

// Connect and consume the welcome frame.
pub async fn connect(url: &str) -> Ws {
    let (mut ws, _response) = connect_async(url).await.expect("websocket connect");
    let welcome = next_json(&mut ws).await;
    assert_eq!(welcome["type"], "connection");
    assert_eq!(welcome["status"], "connected");
    ws
}

pub async fn send_json(ws: &mut Ws, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

pub async fn send_raw(ws: &mut Ws, text: &str) {
    ws.send(Message::Text(text.to_string().into()))
        .await
        .expect("send frame");
}

// Next text frame as JSON; ping/pong are skipped.
pub async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let frame = tokio::time::timeout(FRAME_TIMEOUT, ws.next())
            .await
            .expect("frame should arrive in time")
            .expect("stream should stay open")
            .expect("frame should be readable");
        match frame {
            Message::Text(text) => return serde_json::from_str(text.as_str()).expect("valid json"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

// Next frame, whatever it is; `None` when the stream ended.
pub async fn next_message(ws: &mut Ws) -> Option<Message> {
    tokio::time::timeout(FRAME_TIMEOUT, ws.next())
        .await
        .expect("frame should arrive in time")
        .and_then(Result::ok)
}

// Assert nothing arrives for a short while.
pub async fn assert_silent(ws: &mut Ws) {
    if let Ok(Some(Ok(frame))) = tokio::time::timeout(Duration::from_millis(300), ws.next()).await {
        panic!("expected no frame, got {frame:?}");
    }
}

pub async fn wait_for_clients(handle: &BridgeHandle, expected: usize) {
    for _ in 0..100 {
        if handle.status().await.clients == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("client count never reached {expected}");
}
