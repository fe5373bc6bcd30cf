// Values exchanged between the bridge and the panel.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Last reported state of one actor.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatus {
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

#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    pub result: Option<i32>,
}

/// Everything the bridge can push; frames of unknown type never get this far.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Connection { status: String, message: String },
    PlayerStatus(PlayerStatus),
    PlayerJoin { player: String, uuid: String },
    PlayerLeave { player: String, uuid: String },
    PlayerData(Vec<PlayerStatus>),
    CommandResult(CommandResult),
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelRequest {
    ExecuteCommand {
        command: String,
        player: Option<String>,
    },
    GetPlayerData,
}
