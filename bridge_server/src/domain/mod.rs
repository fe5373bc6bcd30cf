// Domain layer: actor snapshots, command values and the simulation boundary.

pub mod accessor;
pub mod command;
pub mod ports;
pub mod snapshot;

pub use accessor::{ActorAccessor, Capabilities, LegacyAccessor, ModernAccessor};
pub use command::{ActingIdentity, CommandOutcome, CommandRequest};
pub use ports::{FieldError, HostActor, Simulation, SimulationError};
pub use snapshot::{ActorSnapshot, Position};
