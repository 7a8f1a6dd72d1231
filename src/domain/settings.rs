use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            rotation: default_rotation(),
            ansi_colors: default_true(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "companion_link".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // BLE session
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Discoveries weaker than this are treated as noise. Inclusive: a
    /// device exactly at the floor is accepted.
    #[serde(default = "default_rssi_floor")]
    pub rssi_floor_dbm: i16,
    #[serde(default = "default_name_keywords")]
    pub device_name_keywords: Vec<String>,
    #[serde(default = "default_registry_capacity")]
    pub registry_capacity: usize,
    #[serde(default = "default_service_uuid")]
    pub ble_service_uuid: u16,

    // Stream session
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub stream_connect_timeout_ms: u64,
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scan_timeout_ms: default_scan_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            rssi_floor_dbm: default_rssi_floor(),
            device_name_keywords: default_name_keywords(),
            registry_capacity: default_registry_capacity(),
            ble_service_uuid: default_service_uuid(),
            stream_url: default_stream_url(),
            stream_connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_scan_timeout_ms() -> u64 {
    3_000
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_rssi_floor() -> i16 {
    -100
}
fn default_name_keywords() -> Vec<String> {
    vec!["audio".to_string(), "headset".to_string()]
}
fn default_registry_capacity() -> usize {
    10
}
fn default_service_uuid() -> u16 {
    // Audio Sink (SIG-assigned 16-bit UUID)
    0x110B
}
fn default_stream_url() -> String {
    "ws://192.168.4.1:81".to_string()
}
fn default_reconnect_max_attempts() -> u32 {
    3
}

/// Loads and persists [`Settings`] as JSON under the platform config dir.
pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("CompanionLink");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}
