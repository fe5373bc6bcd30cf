// In-memory simulation used by the standalone binary and by tests.

use crate::domain::{
    ActingIdentity, ActorSnapshot, FieldError, HostActor, Position, Simulation, SimulationError,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

/// One actor backed by a plain snapshot. Fields listed as broken fail to read,
/// like a host whose API drifted.
pub struct MemoryActor {
    state: RwLock<ActorSnapshot>,
    broken: HashSet<&'static str>,
}

impl MemoryActor {
    pub fn new(state: ActorSnapshot) -> Self {
        Self {
            state: RwLock::new(state),
            broken: HashSet::new(),
        }
    }

    pub fn named(name: &str, uuid: &str) -> Self {
        Self::new(ActorSnapshot {
            uuid: uuid.to_string(),
            name: name.to_string(),
            health: 20.0,
            max_health: 20.0,
            food: 20,
            experience: 0.0,
            level: 0,
            game_mode: "SURVIVAL".to_string(),
            position: Position {
                x: 0.5,
                y: 64.0,
                z: 0.5,
            },
            dimension: "minecraft:overworld".to_string(),
        })
    }

    pub fn with_broken_fields(mut self, fields: &[&'static str]) -> Self {
        self.broken.extend(fields.iter().copied());
        self
    }

    pub fn update(&self, change: impl FnOnce(&mut ActorSnapshot)) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        change(&mut state);
    }

    fn read<T>(&self, field: &'static str, get: impl FnOnce(&ActorSnapshot) -> T) -> Result<T, FieldError> {
        if self.broken.contains(field) {
            return Err(FieldError::new(field, "not supported by this host"));
        }
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(get(&state))
    }
}

impl HostActor for MemoryActor {
    fn uuid(&self) -> String {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.uuid.clone()
    }

    fn name(&self) -> Result<String, FieldError> {
        self.read("name", |s| s.name.clone())
    }

    fn legacy_display_name(&self) -> Result<String, FieldError> {
        self.read("legacy_display_name", |s| s.name.clone())
    }

    fn health(&self) -> Result<f32, FieldError> {
        self.read("health", |s| s.health)
    }

    fn max_health(&self) -> Result<f32, FieldError> {
        self.read("max_health", |s| s.max_health)
    }

    fn food(&self) -> Result<i32, FieldError> {
        self.read("food", |s| s.food)
    }

    fn experience_progress(&self) -> Result<f32, FieldError> {
        self.read("experience", |s| s.experience)
    }

    fn experience_level(&self) -> Result<i32, FieldError> {
        self.read("level", |s| s.level)
    }

    fn game_mode(&self) -> Result<String, FieldError> {
        self.read("game_mode", |s| s.game_mode.clone())
    }

    fn position(&self) -> Result<(f64, f64, f64), FieldError> {
        self.read("position", |s| (s.position.x, s.position.y, s.position.z))
    }

    fn dimension(&self) -> Result<String, FieldError> {
        self.read("dimension", |s| s.dimension.clone())
    }

    fn legacy_dimension(&self) -> Result<String, FieldError> {
        self.read("legacy_dimension", |s| s.dimension.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedCommand {
    pub identity: ActingIdentity,
    pub command: String,
}

#[derive(Default)]
struct Behaviour {
    result_code: i32,
    next_failure: Option<String>,
    fail_enumeration: bool,
}

/// Simulation whose actors and command results are scripted by the caller.
/// Executed commands are recorded in order.
pub struct InMemorySimulation {
    version: Option<String>,
    actors: RwLock<Vec<Arc<MemoryActor>>>,
    executed: Mutex<Vec<ExecutedCommand>>,
    behaviour: Mutex<Behaviour>,
}

impl InMemorySimulation {
    pub fn new(version: Option<&str>) -> Self {
        Self {
            version: version.map(str::to_string),
            actors: RwLock::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
            behaviour: Mutex::new(Behaviour {
                result_code: 1,
                ..Behaviour::default()
            }),
        }
    }

    pub fn add_actor(&self, actor: MemoryActor) -> Arc<MemoryActor> {
        let actor = Arc::new(actor);
        let mut actors = self.actors.write().unwrap_or_else(|e| e.into_inner());
        actors.push(actor.clone());
        actor
    }

    pub fn remove_actor(&self, uuid: &str) -> Option<Arc<MemoryActor>> {
        let mut actors = self.actors.write().unwrap_or_else(|e| e.into_inner());
        let index = actors.iter().position(|actor| actor.uuid() == uuid)?;
        Some(actors.remove(index))
    }

    pub fn actor_handles(&self) -> Vec<Arc<MemoryActor>> {
        self.actors.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_result_code(&self, code: i32) {
        self.behaviour().result_code = code;
    }

    /// The next `execute` call fails with `message`.
    pub fn fail_next_command(&self, message: &str) {
        self.behaviour().next_failure = Some(message.to_string());
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.behaviour().fail_enumeration = fail;
    }

    pub fn executed(&self) -> Vec<ExecutedCommand> {
        self.executed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn behaviour(&self) -> std::sync::MutexGuard<'_, Behaviour> {
        self.behaviour.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Simulation for InMemorySimulation {
    fn version(&self) -> Option<String> {
        self.version.clone()
    }

    fn actors(&self) -> Result<Vec<Arc<dyn HostActor>>, SimulationError> {
        if self.behaviour().fail_enumeration {
            return Err(SimulationError::Enumeration("player list unavailable".to_string()));
        }
        let actors = self.actors.read().unwrap_or_else(|e| e.into_inner());
        Ok(actors
            .iter()
            .map(|actor| actor.clone() as Arc<dyn HostActor>)
            .collect())
    }

    fn execute(
        &self,
        identity: &ActingIdentity,
        command_line: &str,
    ) -> Result<i32, SimulationError> {
        let mut behaviour = self.behaviour();
        if let Some(message) = behaviour.next_failure.take() {
            return Err(SimulationError::Execution(message));
        }
        self.executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ExecutedCommand {
                identity: identity.clone(),
                command: command_line.to_string(),
            });
        Ok(behaviour.result_code)
    }
}
