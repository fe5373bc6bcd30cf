use crate::interface_adapters::net::ConnectionRegistry;
use crate::interface_adapters::protocol::ServerMessage;
use crate::use_cases::BusEvent;

use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Serializes each bus event once and fans the shared bytes out to every
/// registered connection.
pub async fn bus_serializer(mut bus_rx: mpsc::Receiver<BusEvent>, registry: Arc<ConnectionRegistry>) {
    while let Some(event) = bus_rx.recv().await {
        let msg = ServerMessage::from(event);
        let txt = match serde_json::to_string(&msg) {
            Ok(txt) => txt,
            Err(e) => {
                error!(error = ?e, "failed to serialize bus event");
                continue;
            }
        };

        let report = registry.broadcast(Utf8Bytes::from(txt)).await;
        if report.failed > 0 {
            debug!(
                delivered = report.delivered,
                failed = report.failed,
                "broadcast partially delivered"
            );
        }
    }
    debug!("bus channel closed; serializer exiting");
}
