use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
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
    "picomni_rover_bridge".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,

    // BLE Settings
    #[serde(default = "default_service_uuid")]
    pub ble_service_uuid: String,
    #[serde(default = "default_char_uuid")]
    pub ble_char_uuid: String,
    /// `None` scans until a matching device shows up
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: Option<u64>,

    // Command Settings
    #[serde(default = "default_sample_period_ms")]
    pub sample_period_ms: u64,

    // Host Settings
    #[serde(default = "default_host_socket_name")]
    pub host_socket_name: String,
    #[serde(default = "default_command_topic")]
    pub command_topic: String,
    #[serde(default = "default_pose_topic")]
    pub pose_topic: String,
    #[serde(default = "default_frame_id")]
    pub frame_id: String,
    #[serde(default = "default_pose_queue_depth")]
    pub pose_queue_depth: usize,

    // Debug Settings
    #[serde(default = "default_false")]
    pub debug_raw_data_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_settings: LogSettings::default(),
            ble_service_uuid: default_service_uuid(),
            ble_char_uuid: default_char_uuid(),
            discovery_timeout_secs: default_discovery_timeout_secs(),
            sample_period_ms: default_sample_period_ms(),
            host_socket_name: default_host_socket_name(),
            command_topic: default_command_topic(),
            pose_topic: default_pose_topic(),
            frame_id: default_frame_id(),
            pose_queue_depth: default_pose_queue_depth(),
            debug_raw_data_logging: false,
        }
    }
}

fn default_service_uuid() -> String {
    "69321c59-8017-488e-b5e2-b6d30c834bc5".to_string()
}
fn default_char_uuid() -> String {
    "87bc2dc5-2207-408d-99f6-3d35573c4472".to_string()
}
fn default_discovery_timeout_secs() -> Option<u64> {
    Some(10)
}
fn default_sample_period_ms() -> u64 {
    50
}
fn default_host_socket_name() -> String {
    "picomni_rover_bridge.sock".to_string()
}
fn default_command_topic() -> String {
    "cmd_vel".to_string()
}
fn default_pose_topic() -> String {
    "pose".to_string()
}
fn default_frame_id() -> String {
    "odom".to_string()
}
fn default_pose_queue_depth() -> usize {
    10
}

/// Validated, typed view of [`Settings`] consumed by the bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub service_uuid: Uuid,
    pub char_uuid: Uuid,
    pub discovery_timeout: Option<Duration>,
    pub sample_period: Duration,
    pub frame_id: String,
    pub raw_data_logging: bool,
}

impl Settings {
    pub fn bridge_config(&self) -> anyhow::Result<BridgeConfig> {
        let service_uuid = Uuid::parse_str(&self.ble_service_uuid)
            .with_context(|| format!("Invalid service UUID: {}", self.ble_service_uuid))?;
        let char_uuid = Uuid::parse_str(&self.ble_char_uuid)
            .with_context(|| format!("Invalid characteristic UUID: {}", self.ble_char_uuid))?;

        if self.sample_period_ms == 0 {
            anyhow::bail!("sample_period_ms must be greater than zero");
        }
        if self.pose_queue_depth == 0 {
            anyhow::bail!("pose_queue_depth must be greater than zero");
        }

        Ok(BridgeConfig {
            service_uuid,
            char_uuid,
            discovery_timeout: self.discovery_timeout_secs.map(Duration::from_secs),
            sample_period: Duration::from_millis(self.sample_period_ms),
            frame_id: self.frame_id.clone(),
            raw_data_logging: self.debug_raw_data_logging,
        })
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::load(settings_path))
    }

    /// Load from an explicit path, falling back to defaults when it is missing or unreadable
    pub fn load(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("PicomniRoverBridge");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        let config = settings.bridge_config().unwrap();
        assert_eq!(
            config.service_uuid,
            Uuid::parse_str("69321c59-8017-488e-b5e2-b6d30c834bc5").unwrap()
        );
        assert_eq!(
            config.char_uuid,
            Uuid::parse_str("87bc2dc5-2207-408d-99f6-3d35573c4472").unwrap()
        );
        assert_eq!(config.sample_period, Duration::from_millis(50));
        assert_eq!(config.discovery_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.frame_id, "odom");
        assert_eq!(settings.command_topic, "cmd_vel");
        assert_eq!(settings.pose_topic, "pose");
    }

    #[test]
    fn test_null_timeout_scans_forever() {
        let settings: Settings =
            serde_json::from_str(r#"{"discovery_timeout_secs": null}"#).unwrap();
        assert_eq!(settings.bridge_config().unwrap().discovery_timeout, None);
    }

    #[test]
    fn test_invalid_uuid_rejected() {
        let settings = Settings {
            ble_char_uuid: "not-a-uuid".to_string(),
            ..Default::default()
        };
        assert!(settings.bridge_config().is_err());
    }

    #[test]
    fn test_zero_period_rejected() {
        let settings = Settings {
            sample_period_ms: 0,
            ..Default::default()
        };
        assert!(settings.bridge_config().is_err());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!(
            "picomni_settings_{}.json",
            std::process::id()
        ));
        let mut service = SettingsService::load(path.clone());
        service.settings.sample_period_ms = 20;
        service.save().unwrap();

        let reloaded = SettingsService::load(path.clone());
        assert_eq!(reloaded.get().sample_period_ms, 20);
        let _ = fs::remove_file(path);
    }
}
