// Wire DTOs for the panel side of the bridge socket.

use crate::domain::{CommandResult, PanelRequest, PlayerStatus, Position, ServerEvent};
use serde::{Deserialize, Serialize};

/// Frames the bridge sends. Unknown `type` values land in `Unknown`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connection {
        status: String,
        message: String,
    },
    PlayerStatus(PlayerStatusDto),
    PlayerJoin {
        player: String,
        uuid: String,
    },
    PlayerLeave {
        player: String,
        uuid: String,
    },
    PlayerData {
        players: Vec<PlayerStatusDto>,
    },
    CommandResult {
        success: bool,
        message: String,
        #[serde(default)]
        result: Option<i32>,
    },
    Error {
        message: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct PositionDto {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Deserialize)]
pub struct PlayerStatusDto {
    pub uuid: String,
    pub name: String,
    pub health: f32,
    pub max_health: f32,
    pub food: i32,
    pub experience: f32,
    pub level: i32,
    pub gamemode: String,
    pub position: PositionDto,
    pub dimension: String,
}

impl From<PlayerStatusDto> for PlayerStatus {
    fn from(dto: PlayerStatusDto) -> Self {
        Self {
            uuid: dto.uuid,
            name: dto.name,
            health: dto.health,
            max_health: dto.max_health,
            food: dto.food,
            experience: dto.experience,
            level: dto.level,
            game_mode: dto.gamemode,
            position: Position {
                x: dto.position.x,
                y: dto.position.y,
                z: dto.position.z,
            },
            dimension: dto.dimension,
        }
    }
}

impl ServerMessage {
    /// `None` for message types this panel does not know.
    pub fn into_event(self) -> Option<ServerEvent> {
        let event = match self {
            ServerMessage::Connection { status, message } => {
                ServerEvent::Connection { status, message }
            }
            ServerMessage::PlayerStatus(dto) => ServerEvent::PlayerStatus(dto.into()),
            ServerMessage::PlayerJoin { player, uuid } => ServerEvent::PlayerJoin { player, uuid },
            ServerMessage::PlayerLeave { player, uuid } => ServerEvent::PlayerLeave { player, uuid },
            ServerMessage::PlayerData { players } => {
                ServerEvent::PlayerData(players.into_iter().map(PlayerStatus::from).collect())
            }
            ServerMessage::CommandResult {
                success,
                message,
                result,
            } => ServerEvent::CommandResult(CommandResult {
                success,
                message,
                result,
            }),
            ServerMessage::Error { message } => ServerEvent::Error { message },
            ServerMessage::Unknown => return None,
        };
        Some(event)
    }
}

pub fn decode_server_message(text: &str) -> Result<Option<ServerEvent>, serde_json::Error> {
    let message: ServerMessage = serde_json::from_str(text)?;
    Ok(message.into_event())
}

/// Frames the panel sends.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ExecuteCommand {
        command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        player: Option<String>,
    },
    GetPlayerData,
}

impl From<PanelRequest> for ClientMessage {
    fn from(request: PanelRequest) -> Self {
        match request {
            PanelRequest::ExecuteCommand { command, player } => {
                ClientMessage::ExecuteCommand { command, player }
            }
            PanelRequest::GetPlayerData => ClientMessage::GetPlayerData,
        }
    }
}

pub fn encode_request(request: PanelRequest) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ClientMessage::from(request))
}
