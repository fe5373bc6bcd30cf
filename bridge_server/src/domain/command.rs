// Command values exchanged between the wire and the simulation.

/// One remote request to run a command line inside the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub command: String,
    pub actor: Option<String>,
}

/// Identity a command executes under.
#[derive(Debug, Clone, PartialEq)]
pub enum ActingIdentity {
    /// A currently present actor, addressed by its display name.
    Actor { name: String, uuid: String },
    /// Console identity with operator privileges; never a real actor.
    System,
}

impl ActingIdentity {
    pub const SYSTEM_NAME: &'static str = "DeckBridge";
    pub const SYSTEM_PERMISSION_LEVEL: u8 = 4;

    pub fn label(&self) -> &str {
        match self {
            ActingIdentity::Actor { name, .. } => name,
            ActingIdentity::System => Self::SYSTEM_NAME,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
    /// Engine return code; 0 whenever `success` is false.
    pub result: i32,
}

impl CommandOutcome {
    pub const SUCCESS_MESSAGE: &'static str = "Command executed successfully";

    pub fn succeeded(result: i32) -> Self {
        Self {
            success: true,
            message: Self::SUCCESS_MESSAGE.to_string(),
            result,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            result: 0,
        }
    }
}
