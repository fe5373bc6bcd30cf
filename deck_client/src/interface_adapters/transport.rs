// WebSocket connector used by the connection manager.

use super::protocol::{decode_server_message, encode_request};
use crate::domain::{Connector, PanelRequest, ServerEvent, Transport, TransportError};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt, future};
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::debug;
use url::Url;

use tungstenite::Message;

pub struct WsConnector {
    url: Url,
}

impl WsConnector {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Transport, TransportError> {
        let (socket, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!(url = %self.url, "websocket open");

        let (write, read) = socket.split();

        let sink = write
            .sink_map_err(|e| TransportError::Send(e.to_string()))
            .with(|request: PanelRequest| {
                future::ready(
                    encode_request(request)
                        .map(Message::text)
                        .map_err(|e| TransportError::Send(e.to_string())),
                )
            });
        let events = read.filter_map(|frame| future::ready(frame_to_event(frame)));

        Ok(Transport {
            sink: Box::pin(sink),
            events: Box::pin(events),
        })
    }
}

// `None` skips the frame: control frames, binary payloads and unknown types.
fn frame_to_event(
    frame: Result<Message, tungstenite::Error>,
) -> Option<Result<ServerEvent, TransportError>> {
    match frame {
        Ok(Message::Text(text)) => match decode_server_message(text.as_str()) {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                debug!(frame = %text.as_str(), "ignoring unknown message type");
                None
            }
            Err(e) => Some(Err(TransportError::Malformed(e.to_string()))),
        },
        Ok(Message::Close(_)) => Some(Err(TransportError::Closed)),
        Ok(_) => None,
        Err(e) => Some(Err(TransportError::Receive(e.to_string()))),
    }
}
