use serde::Deserialize;
use std::{env, fs, path::PathBuf, time::Duration};
use thiserror::Error;
use tracing::{info, warn};

// Runtime/server constants (not user-facing settings).

pub const HOST_EVENT_CAPACITY: usize = 1024;
pub const BUS_CAPACITY: usize = 1024;
// Time allowed for background tasks to wind down on stop.
pub const STOP_GRACE: Duration = Duration::from_secs(5);
// Tick rate of the standalone in-memory host.
pub const STANDALONE_TICK_INTERVAL: Duration = Duration::from_millis(1000 / 20);

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_UPDATE_INTERVAL: u32 = 20;
pub const DEFAULT_ALLOWED_CLIENTS: &str = "localhost,127.0.0.1";

const MIN_PORT: i64 = 1024;
const MAX_PORT: i64 = 65535;
const MIN_UPDATE_INTERVAL: i64 = 1;
const MAX_UPDATE_INTERVAL: i64 = 200;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("port {0} is outside 1024-65535")]
    Port(i64),
    #[error("unsupported language {0:?}")]
    Language(String),
    #[error("update interval {0} is outside 1-200")]
    UpdateInterval(i64),
    #[error("{key}: expected {expected}, got {value:?}")]
    Value {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    En,
    Ja,
    EnUs,
    JaJp,
}

impl Language {
    pub fn parse(code: &str) -> Result<Self, ConfigError> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "ja" => Ok(Language::Ja),
            "en_us" => Ok(Language::EnUs),
            "ja_jp" => Ok(Language::JaJp),
            _ => Err(ConfigError::Language(code.to_string())),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ja => "ja",
            Language::EnUs => "en_us",
            Language::JaJp => "ja_jp",
        }
    }

    pub fn welcome(self) -> &'static str {
        match self {
            Language::En | Language::EnUs => "Welcome to DeckBridge",
            Language::Ja | Language::JaJp => "DeckBridgeへようこそ",
        }
    }
}

/// Bridge settings. Every setter validates and leaves the previous value in
/// place when it rejects.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    port: u16,
    language: Language,
    update_interval: u32,
    allowed_clients: Vec<String>,
    auto_start: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            language: Language::default(),
            update_interval: DEFAULT_UPDATE_INTERVAL,
            allowed_clients: split_clients(DEFAULT_ALLOWED_CLIENTS),
            auto_start: true,
        }
    }
}

/// Same keys as the environment, all optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    port: Option<i64>,
    language: Option<String>,
    update_interval: Option<i64>,
    allowed_clients: Option<String>,
    auto_start: Option<bool>,
}

impl BridgeConfig {
    /// Defaults, then `BRIDGE_CONFIG_FILE` (if set), then `BRIDGE_*` variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = env::var("BRIDGE_CONFIG_FILE") {
            if let Err(e) = config.load_file(PathBuf::from(path)) {
                warn!(error = %e, "ignoring config file");
            }
        }
        config.apply_vars(|key| env::var(key).ok());
        info!(
            port = config.port,
            language = config.language.code(),
            update_interval = config.update_interval,
            allowed_clients = ?config.allowed_clients,
            auto_start = config.auto_start,
            "bridge configured"
        );
        config
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn update_interval(&self) -> u32 {
        self.update_interval
    }

    pub fn allowed_clients(&self) -> &[String] {
        &self.allowed_clients
    }

    pub fn auto_start(&self) -> bool {
        self.auto_start
    }

    pub fn set_port(&mut self, port: i64) -> Result<(), ConfigError> {
        if !(MIN_PORT..=MAX_PORT).contains(&port) {
            return Err(ConfigError::Port(port));
        }
        self.port = port as u16;
        Ok(())
    }

    pub fn set_language(&mut self, code: &str) -> Result<(), ConfigError> {
        self.language = Language::parse(code)?;
        Ok(())
    }

    pub fn set_update_interval(&mut self, ticks: i64) -> Result<(), ConfigError> {
        if !(MIN_UPDATE_INTERVAL..=MAX_UPDATE_INTERVAL).contains(&ticks) {
            return Err(ConfigError::UpdateInterval(ticks));
        }
        self.update_interval = ticks as u32;
        Ok(())
    }

    /// Comma separated; an empty list leaves the bridge open to every address.
    pub fn set_allowed_clients(&mut self, list: &str) {
        self.allowed_clients = split_clients(list);
    }

    pub fn set_auto_start(&mut self, enabled: bool) {
        self.auto_start = enabled;
    }

    pub fn load_file(&mut self, path: PathBuf) -> Result<(), ConfigError> {
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read { path, source })?;
        self.apply_toml(&text)
    }

    fn apply_toml(&mut self, text: &str) -> Result<(), ConfigError> {
        let file: FileConfig = toml::from_str(text)?;
        if let Some(port) = file.port {
            keep_previous("port", self.set_port(port));
        }
        if let Some(language) = file.language {
            keep_previous("language", self.set_language(&language));
        }
        if let Some(ticks) = file.update_interval {
            keep_previous("update_interval", self.set_update_interval(ticks));
        }
        if let Some(list) = file.allowed_clients {
            self.set_allowed_clients(&list);
        }
        if let Some(enabled) = file.auto_start {
            self.set_auto_start(enabled);
        }
        Ok(())
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("BRIDGE_PORT") {
            let result = parse_int("BRIDGE_PORT", &value).and_then(|port| self.set_port(port));
            keep_previous("BRIDGE_PORT", result);
        }
        if let Some(value) = lookup("BRIDGE_LANGUAGE") {
            keep_previous("BRIDGE_LANGUAGE", self.set_language(&value));
        }
        if let Some(value) = lookup("BRIDGE_UPDATE_INTERVAL") {
            let result = parse_int("BRIDGE_UPDATE_INTERVAL", &value)
                .and_then(|ticks| self.set_update_interval(ticks));
            keep_previous("BRIDGE_UPDATE_INTERVAL", result);
        }
        if let Some(value) = lookup("BRIDGE_ALLOWED_CLIENTS") {
            self.set_allowed_clients(&value);
        }
        if let Some(value) = lookup("BRIDGE_AUTO_START") {
            let result = parse_bool("BRIDGE_AUTO_START", &value)
                .map(|enabled| self.set_auto_start(enabled));
            keep_previous("BRIDGE_AUTO_START", result);
        }
    }
}

fn keep_previous(key: &str, result: Result<(), ConfigError>) {
    if let Err(e) = result {
        warn!(key, error = %e, "invalid setting; keeping previous value");
    }
}

fn parse_int(key: &'static str, value: &str) -> Result<i64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Value {
        key,
        expected: "an integer",
        value: value.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Value {
            key,
            expected: "a boolean",
            value: value.to_string(),
        }),
    }
}

fn split_clients(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
