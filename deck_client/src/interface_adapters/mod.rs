// Interface adapters: wire protocol, websocket connector, widgets.

pub mod protocol;
pub mod transport;
pub mod widgets;

pub use transport::WsConnector;
pub use widgets::{ButtonFeedback, CommandButton, DisplayFormat, MonitorWidget};
