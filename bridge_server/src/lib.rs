pub mod domain;
pub mod frameworks;
pub mod interface_adapters;
pub mod use_cases;

pub use frameworks::config::{BridgeConfig, Language};
pub use frameworks::server::{Bridge, BridgeHandle, BridgeStatus, run, run_with_config};
