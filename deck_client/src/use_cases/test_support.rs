// Hand-written fakes shared by use-case tests.

use crate::domain::{
    CommandResult, ConnectionState, Connector, PanelRequest, PlayerStatus, Position,
    RequestSink, ServerEvent, Subscriber, Transport, TransportError,
};
use async_trait::async_trait;
use futures::{Sink, SinkExt, StreamExt, channel::mpsc};
use std::{
    pin::Pin,
    task::{Context, Poll},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

pub fn status(name: &str, uuid: &str, health: f32) -> PlayerStatus {
    PlayerStatus {
        uuid: uuid.to_string(),
        name: name.to_string(),
        health,
        max_health: 20.0,
        food: 20,
        experience: 0.5,
        level: 3,
        game_mode: "SURVIVAL".to_string(),
        position: Position {
            x: 1.0,
            y: 64.0,
            z: -1.0,
        },
        dimension: "minecraft:overworld".to_string(),
    }
}

/// Records each callback as a short "kind:detail" string.
#[derive(Default)]
pub struct RecordingSubscriber {
    events: Mutex<Vec<String>>,
}

impl RecordingSubscriber {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Subscriber for RecordingSubscriber {
    fn on_connection_state(&self, state: ConnectionState) {
        self.record(format!("state:{state:?}"));
    }

    fn on_player_status(&self, status: &PlayerStatus) {
        self.record(format!("status:{}", status.name));
    }

    fn on_player_join(&self, player: &str, _uuid: &str) {
        self.record(format!("join:{player}"));
    }

    fn on_player_leave(&self, player: &str, _uuid: &str) {
        self.record(format!("leave:{player}"));
    }

    fn on_command_result(&self, result: &CommandResult) {
        self.record(format!("result:{}", result.success));
    }

    fn on_error(&self, message: &str) {
        self.record(format!("error:{message}"));
    }
}

/// The far end of one fake connection.
pub struct FakeServer {
    events: mpsc::UnboundedSender<Result<ServerEvent, TransportError>>,
    requests: mpsc::UnboundedReceiver<PanelRequest>,
}

impl FakeServer {
    pub fn push(&self, event: ServerEvent) {
        let _ = self.events.unbounded_send(Ok(event));
    }

    pub fn push_error(&self, error: TransportError) {
        let _ = self.events.unbounded_send(Err(error));
    }

    pub async fn next_request(&mut self) -> Option<PanelRequest> {
        self.requests.next().await
    }

    /// Later writes from the panel fail.
    pub fn stop_reading(&mut self) {
        self.requests.close();
    }
}

// A socket whose peer stopped reading: writes never complete.
struct StalledSink;

impl Sink<PanelRequest> for StalledSink {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Pending
    }

    fn start_send(self: Pin<&mut Self>, _item: PanelRequest) -> Result<(), Self::Error> {
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Pending
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Pending
    }
}

#[derive(Default)]
pub struct FakeConnector {
    connects: AtomicUsize,
    delay: Duration,
    stalled: bool,
    fail_next: Mutex<Option<TransportError>>,
    servers: Mutex<Vec<FakeServer>>,
}

impl FakeConnector {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Connections open fine but no write ever completes.
    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::default()
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, error: TransportError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    /// Far end of the most recent connection.
    pub fn take_server(&self) -> FakeServer {
        self.servers
            .lock()
            .unwrap()
            .pop()
            .expect("a connection should have been opened")
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<Transport, TransportError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }
        self.connects.fetch_add(1, Ordering::SeqCst);

        let (events_tx, events_rx) = mpsc::unbounded();
        let (requests_tx, requests_rx) = mpsc::unbounded();
        self.servers.lock().unwrap().push(FakeServer {
            events: events_tx,
            requests: requests_rx,
        });

        let sink: RequestSink = if self.stalled {
            Box::pin(StalledSink)
        } else {
            Box::pin(requests_tx.sink_map_err(|e| TransportError::Send(e.to_string())))
        };
        Ok(Transport {
            sink,
            events: Box::pin(events_rx),
        })
    }
}
