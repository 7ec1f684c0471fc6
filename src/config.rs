//! Configuration for the pulse relay.
//!
//! The configuration is a JSON document with one section per collaborator.
//! Every section falls back to its defaults when a field is missing, and a
//! missing or unreadable file is replaced with the defaults on startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Main configuration for the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Spotify now-playing source
    pub spotify: SpotifyConfig,
    /// Chatbox destination and heart-rate polling
    pub chatbox: ChatboxConfig,
    /// Discord Rich Presence channel
    pub presence: PresenceConfig,
    /// Formatting and feature toggles
    pub display: DisplayConfig,
    /// Phrases picked at random by `/joke`
    pub jokes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spotify: SpotifyConfig::default(),
            chatbox: ChatboxConfig::default(),
            presence: PresenceConfig::default(),
            display: DisplayConfig::default(),
            jokes: vec!["ADD_BAD_JOKES".to_string()],
        }
    }
}

/// Spotify Web API credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub enable: bool,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Long-lived refresh token exchanged for access tokens at runtime
    pub refresh_token: String,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            enable: false,
            client_id: "SPOTIFY_CLIENT_ID".to_string(),
            client_secret: "SPOTIFY_CLIENT_SECRET".to_string(),
            redirect_uri: "http://127.0.0.1:8888/callback".to_string(),
            refresh_token: String::new(),
        }
    }
}

/// Chatbox (OSC) destination and heart-rate source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatboxConfig {
    pub osc_ip: String,
    pub osc_port: u16,
    /// File whose first line holds the current heart rate
    pub text_file_path: PathBuf,
    /// Process that must be running for the heart-rate file to be trusted.
    /// Empty disables the check.
    pub process_name: String,
    /// Heart-rate polling interval
    #[serde(with = "duration_serde")]
    pub check_interval: Duration,
}

impl Default for ChatboxConfig {
    fn default() -> Self {
        Self {
            osc_ip: "127.0.0.1".to_string(),
            osc_port: 9000,
            text_file_path: PathBuf::from("bpm.txt"),
            process_name: "iron-heart.exe".to_string(),
            check_interval: Duration::from_secs(5),
        }
    }
}

/// Discord Rich Presence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub enable: bool,
    pub client_id: String,
    pub assets_enabled: bool,
    pub large_image: String,
    pub large_text: String,
    pub small_image: String,
    pub small_text: String,
    pub debug: bool,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            enable: false,
            client_id: "DISCORD_APP_CLIENT_ID".to_string(),
            assets_enabled: false,
            large_image: "custom_large_image".to_string(),
            large_text: "Custom Large Image".to_string(),
            small_image: "custom_small_image".to_string(),
            small_text: "Custom Small Image".to_string(),
            debug: false,
        }
    }
}

/// Symbols shown for each trend direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendSymbols {
    pub up: String,
    pub down: String,
    pub steady: String,
}

impl Default for TrendSymbols {
    fn default() -> Self {
        Self {
            up: "🔺".to_string(),
            down: "🔻".to_string(),
            steady: "➖".to_string(),
        }
    }
}

/// Formatting and feature toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub heart_icons: Vec<String>,
    pub trend_symbols: TrendSymbols,
    pub high_bpm_threshold: u32,
    pub low_bpm_threshold: u32,
    pub high_bpm_message: String,
    pub low_bpm_message: String,
    pub normal_bpm_message: String,
    /// Joins the heart-rate block, the contextual tag and the custom status
    pub separator: String,
    pub enable_trend: bool,
    pub enable_contextual: bool,
    pub enable_smoothing: bool,
    /// Override window armed by a literal chat line
    #[serde(with = "duration_serde")]
    pub chat_pause_time: Duration,
    /// Override window armed by `/time` and `/joke`
    #[serde(with = "duration_serde")]
    pub canned_pause_time: Duration,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            heart_icons: ["❤️", "💖", "💗", "💙", "💚", "💛", "💜"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            trend_symbols: TrendSymbols::default(),
            high_bpm_threshold: 110,
            low_bpm_threshold: 60,
            high_bpm_message: "🔥".to_string(),
            low_bpm_message: "💤".to_string(),
            normal_bpm_message: "🍿".to_string(),
            separator: " | ".to_string(),
            enable_trend: true,
            enable_contextual: false,
            enable_smoothing: true,
            chat_pause_time: Duration::from_secs(15),
            canned_pause_time: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from `path`, writing the defaults back when the
    /// file is missing or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Config at {path:?} is unusable ({e}), restoring defaults")
                }
            }
        } else {
            tracing::info!("No config at {path:?}, writing defaults");
        }

        let config = Self::default();
        if let Err(e) = config.save_to(path) {
            tracing::warn!("Could not write default config: {e}");
        }
        config
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
            }
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Get the path to the default configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pulse-relay")
            .join("config.json")
    }

    /// Update one scalar setting addressed by a dotted path.
    ///
    /// The raw string is parsed against the key's declared type. On any
    /// error the configuration is left untouched.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), ConfigError> {
        let s = &mut self.spotify;
        let c = &mut self.chatbox;
        let p = &mut self.presence;
        let d = &mut self.display;

        match key {
            "spotify.enable" => s.enable = parse_bool(key, raw)?,
            "spotify.client_id" => s.client_id = raw.to_string(),
            "spotify.client_secret" => s.client_secret = raw.to_string(),
            "spotify.redirect_uri" => s.redirect_uri = raw.to_string(),
            "spotify.refresh_token" => s.refresh_token = raw.to_string(),

            "chatbox.osc_ip" => c.osc_ip = raw.to_string(),
            "chatbox.osc_port" => c.osc_port = parse_value(key, raw, "port number")?,
            "chatbox.text_file_path" => c.text_file_path = PathBuf::from(raw),
            "chatbox.process_name" => c.process_name = raw.to_string(),
            "chatbox.check_interval" => c.check_interval = parse_interval(key, raw)?,

            "presence.enable" => p.enable = parse_bool(key, raw)?,
            "presence.client_id" => p.client_id = raw.to_string(),
            "presence.assets_enabled" => p.assets_enabled = parse_bool(key, raw)?,
            "presence.large_image" => p.large_image = raw.to_string(),
            "presence.large_text" => p.large_text = raw.to_string(),
            "presence.small_image" => p.small_image = raw.to_string(),
            "presence.small_text" => p.small_text = raw.to_string(),
            "presence.debug" => p.debug = parse_bool(key, raw)?,

            "display.trend_symbols.up" => d.trend_symbols.up = raw.to_string(),
            "display.trend_symbols.down" => d.trend_symbols.down = raw.to_string(),
            "display.trend_symbols.steady" => d.trend_symbols.steady = raw.to_string(),
            "display.high_bpm_threshold" => {
                d.high_bpm_threshold = parse_value(key, raw, "integer")?
            }
            "display.low_bpm_threshold" => d.low_bpm_threshold = parse_value(key, raw, "integer")?,
            "display.high_bpm_message" => d.high_bpm_message = raw.to_string(),
            "display.low_bpm_message" => d.low_bpm_message = raw.to_string(),
            "display.normal_bpm_message" => d.normal_bpm_message = raw.to_string(),
            "display.separator" => d.separator = raw.to_string(),
            "display.enable_trend" => d.enable_trend = parse_bool(key, raw)?,
            "display.enable_contextual" => d.enable_contextual = parse_bool(key, raw)?,
            "display.enable_smoothing" => d.enable_smoothing = parse_bool(key, raw)?,
            "display.chat_pause_time" => d.chat_pause_time = parse_seconds(key, raw)?,
            "display.canned_pause_time" => d.canned_pause_time = parse_seconds(key, raw)?,

            "spotify" | "chatbox" | "presence" | "display" | "display.trend_symbols"
            | "display.heart_icons" | "jokes" => {
                return Err(ConfigError::Unsupported(key.to_string()))
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }

        Ok(())
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw, "boolean")),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str, expected: &'static str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(key, raw, expected))
}

fn parse_seconds(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_value(key, raw, "whole seconds")?;
    Ok(Duration::from_secs(secs))
}

/// Polling intervals must be at least one second.
fn parse_interval(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    match parse_seconds(key, raw)? {
        d if d.is_zero() => Err(invalid(key, raw, "positive whole seconds")),
        d => Ok(d),
    }
}

fn invalid(key: &str, raw: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        expected,
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    #[error("Config key {0} holds a list or section and cannot be set from the console")]
    Unsupported(String),

    #[error("Failed to convert '{value}' to {expected} for {key}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// Serde support for Duration as whole seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
