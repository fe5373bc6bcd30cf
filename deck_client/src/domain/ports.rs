use super::events::{CommandResult, ConnectionState, PanelRequest, PlayerStatus, ServerEvent};
use async_trait::async_trait;
use futures::{Sink, Stream};
use std::pin::Pin;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connect timed out")]
    ConnectTimeout,
    #[error("send failed: {0}")]
    Send(String),
    #[error("receive failed: {0}")]
    Receive(String),
    // A single bad frame; the connection itself is still usable.
    #[error("{0}")]
    Malformed(String),
    #[error("connection closed")]
    Closed,
}

// The stream/sink types leak futures into this layer, which keeps the
// manager independent of the socket library.
pub type RequestSink = Pin<Box<dyn Sink<PanelRequest, Error = TransportError> + Send>>;
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ServerEvent, TransportError>> + Send>>;

/// One open connection: the write half and the decoded read half.
pub struct Transport {
    pub sink: RequestSink,
    pub events: EventStream,
}

// The connection manager depends on this trait, not on the websocket client.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Transport, TransportError>;
}

/// Callbacks a widget receives from the shared connection. All default to
/// no-ops so a widget only implements what it shows.
pub trait Subscriber: Send + Sync {
    fn on_connection_state(&self, _state: ConnectionState) {}
    fn on_player_status(&self, _status: &PlayerStatus) {}
    fn on_player_join(&self, _player: &str, _uuid: &str) {}
    fn on_player_leave(&self, _player: &str, _uuid: &str) {}
    fn on_command_result(&self, _result: &CommandResult) {}
    fn on_error(&self, _message: &str) {}
}
