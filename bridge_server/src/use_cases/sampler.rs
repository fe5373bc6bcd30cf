// Periodic state sampling driven by host tick events.

use super::host::{AttachedSimulation, SimulationSlot};
use super::types::{BusEvent, HostEvent};
use crate::domain::ActorSnapshot;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Notify, mpsc, watch};
use tracing::{debug, info, warn};

/// Counts host ticks and samples every actor once per `tick_threshold` ticks.
///
/// Join/leave are edge-triggered and handled outside the tick count; the
/// periodic snapshot is level-triggered.
#[derive(Debug)]
pub struct StateSampler {
    tick_threshold: u32,
    ticks: u32,
    known: HashMap<String, ActorSnapshot>,
}

impl StateSampler {
    pub fn new(tick_threshold: u32) -> Self {
        Self {
            tick_threshold: tick_threshold.max(1),
            ticks: 0,
            known: HashMap::new(),
        }
    }

    /// Advances the tick counter; returns a batch when the threshold is reached.
    pub fn on_tick(&mut self, attached: &AttachedSimulation) -> Option<Vec<ActorSnapshot>> {
        self.ticks += 1;
        if self.ticks < self.tick_threshold {
            return None;
        }
        self.ticks = 0;
        Some(self.sample(attached))
    }

    /// Reads every present actor. An enumeration failure yields an empty batch
    /// and leaves the known set untouched.
    pub fn sample(&mut self, attached: &AttachedSimulation) -> Vec<ActorSnapshot> {
        let actors = match attached.simulation.actors() {
            Ok(actors) => actors,
            Err(e) => {
                warn!(error = %e, "actor enumeration failed; skipping sample");
                return Vec::new();
            }
        };

        let batch: Vec<ActorSnapshot> = actors
            .iter()
            .map(|actor| attached.accessor.snapshot(actor.as_ref()))
            .collect();

        self.known = batch
            .iter()
            .map(|snapshot| (snapshot.uuid.clone(), snapshot.clone()))
            .collect();
        batch
    }

    pub fn forget(&mut self, uuid: &str) -> Option<ActorSnapshot> {
        self.known.remove(uuid)
    }

    pub fn known(&self) -> Vec<ActorSnapshot> {
        self.known.values().cloned().collect()
    }
}

/// Consumes host events in order, emitting bus events for the serializer.
pub async fn sampler_task(
    mut host_rx: mpsc::Receiver<HostEvent>,
    simulation: SimulationSlot,
    bus_tx: mpsc::Sender<BusEvent>,
    known_tx: watch::Sender<Arc<Vec<ActorSnapshot>>>,
    tick_threshold: u32,
    shutdown: Arc<Notify>,
) {
    let mut sampler = StateSampler::new(tick_threshold);

    loop {
        let event = tokio::select! {
            _ = shutdown.notified() => break,
            event = host_rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let outgoing = match event {
            HostEvent::Tick => {
                let Some(attached) = simulation.current() else {
                    continue;
                };
                let Some(batch) = sampler.on_tick(&attached) else {
                    continue;
                };
                debug!(count = batch.len(), "sampled actors");
                known_tx.send_replace(Arc::new(sampler.known()));
                batch.into_iter().map(BusEvent::Snapshot).collect()
            }
            HostEvent::ActorJoined { name, uuid } => {
                info!(player = %name, %uuid, "player joined");
                vec![BusEvent::Joined { name, uuid }]
            }
            HostEvent::ActorLeft { name, uuid } => {
                info!(player = %name, %uuid, "player left");
                if sampler.forget(&uuid).is_some() {
                    known_tx.send_replace(Arc::new(sampler.known()));
                }
                vec![BusEvent::Left { name, uuid }]
            }
        };

        for event in outgoing {
            if bus_tx.send(event).await.is_err() {
                warn!("bus channel closed; sampler exiting");
                return;
            }
        }
    }

    debug!("sampler stopped");
}
