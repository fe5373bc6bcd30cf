// Use cases layer: sampling, command resolution and host wiring.

pub mod commands;
pub mod host;
pub mod sampler;
pub mod types;

pub use commands::CommandResolver;
pub use host::{AttachedSimulation, SimulationSlot};
pub use sampler::{StateSampler, sampler_task};
pub use types::{BusEvent, HostEvent};
