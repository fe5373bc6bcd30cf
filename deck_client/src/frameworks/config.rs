use crate::use_cases::ConnectionSettings;
use std::{env, time::Duration};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

// Runtime constants (not user-facing settings).

// How often a dropped connection is retried by the panel binary.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(5);
// Monitor title refresh, matching a hardware key's redraw rate.
pub const TITLE_REFRESH: Duration = Duration::from_secs(1);

pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8080";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid server url {value:?}: {reason}")]
    Url { value: String, reason: String },
    #[error("{key}: expected a positive number of milliseconds, got {value:?}")]
    Millis { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelConfig {
    server_url: Url,
    connect_timeout: Duration,
    send_timeout: Duration,
    command: Option<String>,
    player: Option<String>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            server_url: Url::parse(DEFAULT_SERVER_URL).expect("valid default url"),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            send_timeout: Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS),
            command: None,
            player: None,
        }
    }
}

impl PanelConfig {
    /// Defaults overridden by `DECK_*` variables; bad values keep the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_vars(|key| env::var(key).ok());
        info!(
            server_url = %config.server_url,
            connect_timeout_ms = config.connect_timeout.as_millis() as u64,
            send_timeout_ms = config.send_timeout.as_millis() as u64,
            command = ?config.command,
            player = ?config.player,
            "panel configured"
        );
        config
    }

    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            connect_timeout: self.connect_timeout,
            send_timeout: self.send_timeout,
        }
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn player(&self) -> Option<&str> {
        self.player.as_deref()
    }

    pub fn set_server_url(&mut self, value: &str) -> Result<(), ConfigError> {
        let url = Url::parse(value.trim()).map_err(|e| ConfigError::Url {
            value: value.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::Url {
                value: value.to_string(),
                reason: "scheme must be ws or wss".to_string(),
            });
        }
        self.server_url = url;
        Ok(())
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("DECK_SERVER_URL") {
            keep_previous("DECK_SERVER_URL", self.set_server_url(&value));
        }
        if let Some(value) = lookup("DECK_CONNECT_TIMEOUT_MS") {
            match parse_millis("DECK_CONNECT_TIMEOUT_MS", &value) {
                Ok(timeout) => self.connect_timeout = timeout,
                Err(e) => keep_previous("DECK_CONNECT_TIMEOUT_MS", Err(e)),
            }
        }
        if let Some(value) = lookup("DECK_SEND_TIMEOUT_MS") {
            match parse_millis("DECK_SEND_TIMEOUT_MS", &value) {
                Ok(timeout) => self.send_timeout = timeout,
                Err(e) => keep_previous("DECK_SEND_TIMEOUT_MS", Err(e)),
            }
        }
        self.command = lookup("DECK_COMMAND").and_then(non_blank);
        self.player = lookup("DECK_PLAYER").and_then(non_blank);
    }
}

fn keep_previous(key: &str, result: Result<(), ConfigError>) {
    if let Err(e) = result {
        warn!(key, error = %e, "invalid setting; keeping previous value");
    }
}

fn parse_millis(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::Millis {
            key,
            value: value.to_string(),
        }),
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
