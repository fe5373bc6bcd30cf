pub mod domain;
pub mod frameworks;
pub mod interface_adapters;
pub mod use_cases;

pub use domain::{CommandResult, ConnectionState, PlayerStatus, Position, Subscriber, TransportError};
pub use frameworks::config::PanelConfig;
pub use interface_adapters::{ButtonFeedback, CommandButton, DisplayFormat, MonitorWidget, WsConnector};
pub use use_cases::{ConnectionManager, ConnectionSettings, SubscriberId, SubscriberRegistry};
