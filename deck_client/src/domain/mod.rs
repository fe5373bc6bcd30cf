// Domain layer: panel-side view of the bus and its ports.

mod events;
mod ports;

// Re-export the domain boundary types and ports.
pub use events::{CommandResult, ConnectionState, PanelRequest, PlayerStatus, Position, ServerEvent};
pub use ports::{Connector, EventStream, RequestSink, Subscriber, Transport, TransportError};
