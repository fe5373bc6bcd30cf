// Per-tick actor state sampled from the simulation.

pub const MAX_FOOD: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Immutable view of one actor at a sample tick.
///
/// A newer snapshot for the same `uuid` supersedes this one; snapshots are never
/// mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSnapshot {
    pub uuid: String,
    pub name: String,
    pub health: f32,
    pub max_health: f32,
    pub food: i32,
    pub experience: f32,
    pub level: i32,
    pub game_mode: String,
    pub position: Position,
    pub dimension: String,
}

impl ActorSnapshot {
    /// Clamps numeric fields into the ranges clients rely on.
    pub fn normalized(mut self) -> Self {
        if !self.max_health.is_finite() || self.max_health <= 0.0 {
            self.max_health = DEFAULT_MAX_HEALTH;
        }
        self.health = if self.health.is_finite() {
            self.health.clamp(0.0, self.max_health)
        } else {
            0.0
        };
        self.food = self.food.clamp(0, MAX_FOOD);
        self.experience = if self.experience.is_finite() {
            self.experience.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.level = self.level.max(0);
        self
    }
}

pub const DEFAULT_MAX_HEALTH: f32 = 20.0;
