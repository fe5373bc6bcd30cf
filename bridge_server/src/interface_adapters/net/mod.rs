// Network adapter: connection registry, broadcast serializer and the panel socket.

pub mod allow_list;
pub mod broadcast;
pub mod client;
pub mod registry;

pub use allow_list::AllowList;
pub use broadcast::bus_serializer;
pub use client::ws_handler;
pub use registry::{BroadcastReport, ConnId, ConnectionHandle, ConnectionRegistry, DeliveryError};
