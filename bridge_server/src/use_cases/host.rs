// The live simulation as seen by the core after capability negotiation.

use crate::domain::{ActorAccessor, Capabilities, Simulation};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Simulation plus the accessor selected for it. Built once per attach.
pub struct AttachedSimulation {
    pub simulation: Arc<dyn Simulation>,
    pub accessor: Arc<dyn ActorAccessor>,
    pub capabilities: Capabilities,
}

impl AttachedSimulation {
    pub fn negotiate(simulation: Arc<dyn Simulation>) -> Self {
        let capabilities = Capabilities::negotiate(simulation.as_ref());
        let accessor = capabilities.select_accessor();
        info!(
            version = ?capabilities.version,
            modern_names = capabilities.modern_names,
            modern_dimensions = capabilities.modern_dimensions,
            "simulation attached"
        );
        Self {
            simulation,
            accessor,
            capabilities,
        }
    }
}

/// Holds the currently attached simulation, if the host has supplied one.
#[derive(Clone)]
pub struct SimulationSlot {
    tx: watch::Sender<Option<Arc<AttachedSimulation>>>,
}

impl SimulationSlot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn attach(&self, simulation: Arc<dyn Simulation>) {
        let attached = Arc::new(AttachedSimulation::negotiate(simulation));
        self.tx.send_replace(Some(attached));
    }

    pub fn detach(&self) {
        if self.tx.send_replace(None).is_some() {
            info!("simulation detached");
        }
    }

    /// Clones the current value so no borrow is held across awaits.
    pub fn current(&self) -> Option<Arc<AttachedSimulation>> {
        self.tx.borrow().clone()
    }
}

impl Default for SimulationSlot {
    fn default() -> Self {
        Self::new()
    }
}
