// Panel widgets built on the shared connection: a title renderer, a monitor
// that follows one actor, and a button that sends a fixed command.
//
// Placeholders (case-insensitive): health, maxHealth, healthPercent, food,
// foodPercent, level, experience, x, y, z, gamemode, dimension, name.
// Unknown placeholders are left in place.

use crate::domain::{CommandResult, ConnectionState, PlayerStatus, Subscriber};
use crate::use_cases::ConnectionManager;
use regex::{Captures, Regex};
use std::sync::{Arc, LazyLock, Mutex};
use tracing::{info, warn};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("valid regex"));

pub const DEFAULT_ICON: &str = "🎮";
pub const HEALTH_FORMAT: &str = "❤️ {health}/{maxHealth}";
pub const POSITION_FORMAT: &str = "📍 {x}, {y}, {z}";
pub const LEVEL_FORMAT: &str = "⭐ Lv.{level} ({experience}%)";

const MAX_FOOD: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFormat {
    template: String,
}

impl Default for DisplayFormat {
    fn default() -> Self {
        Self::new(HEALTH_FORMAT)
    }
}

impl DisplayFormat {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn render(&self, status: &PlayerStatus) -> String {
        PLACEHOLDER
            .replace_all(&self.template, |caps: &Captures| {
                placeholder_value(&caps[1], status).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Shown while the panel has no connection.
    pub fn offline(&self) -> String {
        self.blanked("Offline")
    }

    /// Shown while connected but before the tracked actor reported.
    pub fn no_data(&self) -> String {
        self.blanked("--")
    }

    fn blanked(&self, fallback: &str) -> String {
        if self.template.is_empty() {
            return format!("{DEFAULT_ICON} {fallback}");
        }
        PLACEHOLDER.replace_all(&self.template, "--").into_owned()
    }
}

fn placeholder_value(key: &str, status: &PlayerStatus) -> Option<String> {
    let value = match key.to_ascii_lowercase().as_str() {
        "health" => whole(status.health.into()),
        "maxhealth" => whole(status.max_health.into()),
        "healthpercent" => {
            if status.max_health > 0.0 {
                whole(f64::from(status.health) / f64::from(status.max_health) * 100.0)
            } else {
                "0".to_string()
            }
        }
        "food" => status.food.to_string(),
        "foodpercent" => whole(f64::from(status.food) / MAX_FOOD * 100.0),
        "level" => status.level.to_string(),
        "experience" => whole(f64::from(status.experience) * 100.0),
        "x" => whole(status.position.x),
        "y" => whole(status.position.y),
        "z" => whole(status.position.z),
        "gamemode" => status.game_mode.clone(),
        "dimension" => status.dimension.clone(),
        "name" => status.name.clone(),
        _ => return None,
    };
    Some(value)
}

// Rounds half away from zero and never prints "-0".
fn whole(value: f64) -> String {
    let rounded = value.round();
    if rounded == 0.0 {
        return "0".to_string();
    }
    format!("{rounded:.0}")
}

/// Follows one actor by name, or the first actor that reports when no name
/// is configured.
pub struct MonitorWidget {
    player: Option<String>,
    format: DisplayFormat,
    current: Mutex<Option<PlayerStatus>>,
}

impl MonitorWidget {
    pub fn new(player: Option<&str>, format: DisplayFormat) -> Self {
        Self {
            player: player
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            format,
            current: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Option<PlayerStatus> {
        self.lock().clone()
    }

    pub fn render(&self, state: ConnectionState) -> String {
        if state != ConnectionState::Connected {
            return self.format.offline();
        }
        match self.lock().as_ref() {
            Some(status) => self.format.render(status),
            None => self.format.no_data(),
        }
    }

    fn tracks(&self, name: &str, current: Option<&PlayerStatus>) -> bool {
        match (&self.player, current) {
            (Some(wanted), _) => wanted.eq_ignore_ascii_case(name),
            (None, Some(seen)) => seen.name.eq_ignore_ascii_case(name),
            (None, None) => true,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<PlayerStatus>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Subscriber for MonitorWidget {
    fn on_player_status(&self, status: &PlayerStatus) {
        let mut current = self.lock();
        if self.tracks(&status.name, current.as_ref()) {
            *current = Some(status.clone());
        }
    }

    fn on_player_leave(&self, player: &str, _uuid: &str) {
        let mut current = self.lock();
        if current
            .as_ref()
            .is_some_and(|status| status.name.eq_ignore_ascii_case(player))
        {
            *current = None;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonFeedback {
    Ok,
    Alert,
}

#[derive(Debug, Clone)]
pub struct CommandButton {
    command: String,
    player: Option<String>,
}

impl CommandButton {
    pub fn new(command: impl Into<String>, player: Option<&str>) -> Self {
        Self {
            command: command.into(),
            player: player
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        }
    }

    pub fn title(&self) -> &str {
        if self.command.is_empty() {
            "Command"
        } else {
            &self.command
        }
    }

    /// Connects first when needed. `Ok` only means the command was written to
    /// the socket; its outcome arrives later as a command result.
    pub async fn press(&self, manager: &Arc<ConnectionManager>) -> ButtonFeedback {
        if self.command.trim().is_empty() {
            warn!("button has no command");
            return ButtonFeedback::Alert;
        }
        if !manager.is_connected() {
            if let Err(e) = manager.connect().await {
                warn!(error = %e, command = %self.command, "cannot send; bridge unreachable");
                return ButtonFeedback::Alert;
            }
        }
        if manager
            .send_command(&self.command, self.player.as_deref())
            .await
        {
            ButtonFeedback::Ok
        } else {
            ButtonFeedback::Alert
        }
    }
}

impl Subscriber for CommandButton {
    fn on_command_result(&self, result: &CommandResult) {
        if result.success {
            info!(message = %result.message, "command executed");
        } else {
            warn!(message = %result.message, "command failed");
        }
    }
}
