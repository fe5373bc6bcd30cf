// Frameworks layer: configuration and runtime bootstrap for the bridge.

pub mod config;
pub mod server;
