// Use-case level inputs/outputs for the sampler loop.

use crate::domain::ActorSnapshot;

/// Events the host pushes into the core. Produced on the host's threads with
/// `try_send`, consumed in order by the sampler task.
#[derive(Debug, Clone)]
pub enum HostEvent {
    Tick,
    ActorJoined { name: String, uuid: String },
    ActorLeft { name: String, uuid: String },
}

/// Events the sampler hands to the broadcast side.
#[derive(Debug, Clone)]
pub enum BusEvent {
    Snapshot(ActorSnapshot),
    Joined { name: String, uuid: String },
    Left { name: String, uuid: String },
}
