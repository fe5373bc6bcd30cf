// Capability negotiation and the single accessor chosen from it.

use crate::domain::ports::{FieldError, HostActor, Simulation};
use crate::domain::snapshot::{ActorSnapshot, DEFAULT_MAX_HEALTH, Position};
use std::sync::Arc;
use tracing::debug;

pub const UNKNOWN_NAME: &str = "Unknown Player";
pub const UNKNOWN_GAME_MODE: &str = "UNKNOWN";
pub const UNKNOWN_DIMENSION: &str = "unknown_dimension";

/// Fixed feature set derived once from the host version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub version: Option<(u32, u32, u32)>,
    pub modern_names: bool,
    pub modern_dimensions: bool,
}

impl Capabilities {
    /// Checks the host version once. Unknown or unparseable versions count as modern.
    pub fn negotiate(simulation: &dyn Simulation) -> Self {
        let version = simulation.version().as_deref().and_then(parse_version);
        let at_least = |major: u32, minor: u32| match version {
            Some((v_major, v_minor, _)) => (v_major, v_minor) >= (major, minor),
            None => true,
        };

        let capabilities = Self {
            version,
            modern_names: at_least(1, 19),
            modern_dimensions: at_least(1, 16),
        };
        debug!(?capabilities, "negotiated simulation capabilities");
        capabilities
    }

    pub fn select_accessor(&self) -> Arc<dyn ActorAccessor> {
        if self.modern_names && self.modern_dimensions {
            Arc::new(ModernAccessor)
        } else {
            Arc::new(LegacyAccessor {
                modern_dimensions: self.modern_dimensions,
            })
        }
    }
}

fn parse_version(raw: &str) -> Option<(u32, u32, u32)> {
    let mut parts = raw.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    // Release versions like `1.21` omit the patch component.
    let patch = match parts.next() {
        Some(part) => part.parse().ok()?,
        None => 0,
    };
    Some((major, minor, patch))
}

/// Reads actor fields through one API family, substituting safe defaults.
pub trait ActorAccessor: Send + Sync {
    fn name(&self, actor: &dyn HostActor) -> String;
    fn dimension(&self, actor: &dyn HostActor) -> String;

    fn snapshot(&self, actor: &dyn HostActor) -> ActorSnapshot {
        let (x, y, z) = or_default(actor.position(), (0.0, 0.0, 0.0));
        ActorSnapshot {
            uuid: actor.uuid(),
            name: self.name(actor),
            health: or_default(actor.health(), 0.0),
            max_health: or_default(actor.max_health(), DEFAULT_MAX_HEALTH),
            food: or_default(actor.food(), 0),
            experience: or_default(actor.experience_progress(), 0.0),
            level: or_default(actor.experience_level(), 0),
            game_mode: or_default(actor.game_mode(), UNKNOWN_GAME_MODE.to_string()),
            position: Position { x, y, z },
            dimension: self.dimension(actor),
        }
        .normalized()
    }
}

fn or_default<T>(value: Result<T, FieldError>, fallback: T) -> T {
    value.unwrap_or_else(|e| {
        debug!(error = %e, "actor field read failed; using fallback");
        fallback
    })
}

#[derive(Debug, Clone, Copy)]
pub struct ModernAccessor;

impl ActorAccessor for ModernAccessor {
    fn name(&self, actor: &dyn HostActor) -> String {
        or_default(actor.name(), UNKNOWN_NAME.to_string())
    }

    fn dimension(&self, actor: &dyn HostActor) -> String {
        or_default(actor.dimension(), UNKNOWN_DIMENSION.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LegacyAccessor {
    modern_dimensions: bool,
}

impl ActorAccessor for LegacyAccessor {
    fn name(&self, actor: &dyn HostActor) -> String {
        or_default(actor.legacy_display_name(), UNKNOWN_NAME.to_string())
    }

    fn dimension(&self, actor: &dyn HostActor) -> String {
        let read = if self.modern_dimensions {
            actor.dimension()
        } else {
            actor.legacy_dimension()
        };
        or_default(read, UNKNOWN_DIMENSION.to_string())
    }
}
