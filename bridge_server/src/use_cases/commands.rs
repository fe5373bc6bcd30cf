// Resolves the acting identity for remote commands and runs them.

use super::host::AttachedSimulation;
use crate::domain::{ActingIdentity, CommandOutcome, CommandRequest};
use tracing::{info, warn};

pub const SERVER_UNAVAILABLE: &str = "Server not available";
pub const EMPTY_COMMAND: &str = "Command must not be empty";

pub struct CommandResolver<'a> {
    attached: Option<&'a AttachedSimulation>,
}

impl<'a> CommandResolver<'a> {
    pub fn new(attached: Option<&'a AttachedSimulation>) -> Self {
        Self { attached }
    }

    /// Picks who the command runs as.
    ///
    /// Explicit name (exact match) first, then the first present actor in the
    /// simulation's enumeration order, then the system identity when nobody is
    /// present.
    fn resolve_identity(
        attached: &AttachedSimulation,
        actor: Option<&str>,
    ) -> Result<ActingIdentity, CommandOutcome> {
        let actors = attached
            .simulation
            .actors()
            .map_err(|e| CommandOutcome::failed(format!("Command execution failed: {e}")))?;

        if let Some(wanted) = actor {
            return actors
                .iter()
                .find(|candidate| attached.accessor.name(candidate.as_ref()) == wanted)
                .map(|found| ActingIdentity::Actor {
                    name: wanted.to_string(),
                    uuid: found.uuid(),
                })
                .ok_or_else(|| CommandOutcome::failed(format!("Player '{wanted}' not found")));
        }

        match actors.first() {
            Some(first) => {
                let name = attached.accessor.name(first.as_ref());
                info!(player = %name, "auto-selected command sender");
                Ok(ActingIdentity::Actor {
                    name,
                    uuid: first.uuid(),
                })
            }
            None => {
                warn!("no players online; executing command as system");
                Ok(ActingIdentity::System)
            }
        }
    }

    /// Never panics through to the caller's connection; simulation errors become
    /// failed outcomes.
    pub fn execute(&self, request: &CommandRequest) -> CommandOutcome {
        let command = request.command.trim();
        if command.is_empty() {
            return CommandOutcome::failed(EMPTY_COMMAND);
        }
        let Some(attached) = self.attached else {
            return CommandOutcome::failed(SERVER_UNAVAILABLE);
        };

        let identity = match Self::resolve_identity(attached, request.actor.as_deref()) {
            Ok(identity) => identity,
            Err(outcome) => return outcome,
        };

        info!(command, sender = identity.label(), "executing command");
        match attached.simulation.execute(&identity, command) {
            Ok(result) => {
                info!(command, result, "command executed");
                CommandOutcome::succeeded(result)
            }
            Err(e) => {
                warn!(command, error = %e, "command execution failed");
                CommandOutcome::failed(format!("Command execution failed: {e}"))
            }
        }
    }
}
