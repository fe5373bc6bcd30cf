// Frameworks layer: configuration and process bootstrap for the panel.

pub mod config;
pub mod runtime;
