// Interface adapters: wire protocol, network handling and the in-memory host.

pub mod net;
pub mod protocol;
pub mod sim;
pub mod state;
