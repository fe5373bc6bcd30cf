// Wire protocol DTOs and conversions for the control-panel socket.
// Every frame is one JSON object with a top-level "type" field.

use crate::domain::{ActorSnapshot, CommandOutcome, CommandRequest};
use crate::use_cases::BusEvent;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Messages the server sends to connected panels.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    // Sent once right after accept.
    Connection { status: String, message: String },
    PlayerStatus(PlayerStatusDto),
    PlayerJoin { player: String, uuid: String },
    PlayerLeave { player: String, uuid: String },
    // Reply to get_player_data, unicast.
    PlayerData { players: Vec<PlayerStatusDto> },
    // Reply to execute_command, unicast.
    CommandResult {
        success: bool,
        message: String,
        result: i32,
    },
    Error { message: String },
}

impl ServerMessage {
    pub fn welcome(message: &str) -> Self {
        ServerMessage::Connection {
            status: "connected".to_string(),
            message: message.to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn player_data(snapshots: &[ActorSnapshot]) -> Self {
        ServerMessage::PlayerData {
            players: snapshots.iter().map(PlayerStatusDto::from).collect(),
        }
    }
}

impl From<BusEvent> for ServerMessage {
    fn from(event: BusEvent) -> Self {
        match event {
            BusEvent::Snapshot(snapshot) => ServerMessage::PlayerStatus((&snapshot).into()),
            BusEvent::Joined { name, uuid } => ServerMessage::PlayerJoin { player: name, uuid },
            BusEvent::Left { name, uuid } => ServerMessage::PlayerLeave { player: name, uuid },
        }
    }
}

impl From<CommandOutcome> for ServerMessage {
    fn from(outcome: CommandOutcome) -> Self {
        ServerMessage::CommandResult {
            success: outcome.success,
            message: outcome.message,
            result: outcome.result,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionDto {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Flattened actor snapshot, shared by `player_status` and `player_data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
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

impl From<&ActorSnapshot> for PlayerStatusDto {
    fn from(snapshot: &ActorSnapshot) -> Self {
        Self {
            uuid: snapshot.uuid.clone(),
            name: snapshot.name.clone(),
            health: snapshot.health,
            max_health: snapshot.max_health,
            food: snapshot.food,
            experience: snapshot.experience,
            level: snapshot.level,
            gamemode: snapshot.game_mode.clone(),
            position: PositionDto {
                x: snapshot.position.x,
                y: snapshot.position.y,
                z: snapshot.position.z,
            },
            dimension: snapshot.dimension.clone(),
        }
    }
}

/// Messages panels send to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    ExecuteCommand(CommandRequest),
    GetPlayerData,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid message format: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct ExecuteCommandDto {
    command: String,
    #[serde(default)]
    player: Option<String>,
}

impl From<ExecuteCommandDto> for CommandRequest {
    fn from(dto: ExecuteCommandDto) -> Self {
        // A blank player name means "no explicit actor".
        let actor = dto
            .player
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        Self {
            command: dto.command,
            actor,
        }
    }
}

/// Reads the envelope first so an unknown type can be reported by name.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, DecodeError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    match envelope.kind.as_str() {
        "execute_command" => {
            let dto: ExecuteCommandDto = serde_json::from_str(text)?;
            Ok(ClientMessage::ExecuteCommand(dto.into()))
        }
        "get_player_data" => Ok(ClientMessage::GetPlayerData),
        _ => Err(DecodeError::UnknownType(envelope.kind)),
    }
}
