// Ports for the host simulation. The host plugin implements these; the core only
// reads through them.

use crate::domain::command::ActingIdentity;
use std::sync::Arc;

/// A single field read failed, usually because the host API drifted.
#[derive(Debug, Clone, thiserror::Error)]
#[error("field `{field}` unavailable: {reason}")]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SimulationError {
    #[error("actor enumeration failed: {0}")]
    Enumeration(String),
    #[error("{0}")]
    Execution(String),
}

/// Raw accessors for one live actor. Every read may fail on version mismatch.
///
/// The `legacy_*` accessors mirror the older host API shapes; which family is
/// used is decided once at attach time, see [`crate::domain::accessor`].
pub trait HostActor: Send + Sync {
    fn uuid(&self) -> String;
    fn name(&self) -> Result<String, FieldError>;
    fn legacy_display_name(&self) -> Result<String, FieldError>;
    fn health(&self) -> Result<f32, FieldError>;
    fn max_health(&self) -> Result<f32, FieldError>;
    fn food(&self) -> Result<i32, FieldError>;
    fn experience_progress(&self) -> Result<f32, FieldError>;
    fn experience_level(&self) -> Result<i32, FieldError>;
    fn game_mode(&self) -> Result<String, FieldError>;
    fn position(&self) -> Result<(f64, f64, f64), FieldError>;
    fn dimension(&self) -> Result<String, FieldError>;
    fn legacy_dimension(&self) -> Result<String, FieldError>;
}

/// Read-only data source plus the command entry point of the host simulation.
pub trait Simulation: Send + Sync {
    /// Host version string (for example `1.20.4`), if the host can report one.
    fn version(&self) -> Option<String>;

    /// Currently present actors in the host's enumeration order.
    fn actors(&self) -> Result<Vec<Arc<dyn HostActor>>, SimulationError>;

    /// Runs `command_line` as `identity` and returns the engine result code.
    fn execute(
        &self,
        identity: &ActingIdentity,
        command_line: &str,
    ) -> Result<i32, SimulationError>;
}
