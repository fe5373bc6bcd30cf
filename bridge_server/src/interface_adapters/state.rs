use crate::domain::ActorSnapshot;
use crate::interface_adapters::net::{AllowList, ConnectionRegistry};
use crate::use_cases::SimulationSlot;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    // Single owner of connection handles.
    pub registry: Arc<ConnectionRegistry>,
    // Live simulation used by the command resolver.
    pub simulation: SimulationSlot,
    // Last sampled snapshots, answered on get_player_data.
    pub known_rx: watch::Receiver<Arc<Vec<ActorSnapshot>>>,
    pub allow_list: AllowList,
    // Localized text for the connection frame.
    pub welcome: Arc<str>,
    // Flips to true when the bridge stops.
    pub shutdown_rx: watch::Receiver<bool>,
}
