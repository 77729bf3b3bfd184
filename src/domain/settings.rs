use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Logging configuration. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive such as `info` or `fog_control=debug`.
    pub level: String,
    pub file_logging_enabled: bool,
    pub console_logging_enabled: bool,
    pub log_dir: PathBuf,
    pub file_name_prefix: String,
    pub show_file_line: bool,
    pub show_target: bool,
    pub ansi_colors: bool,
    /// `daily`, `hourly`, `minutely` or `never`.
    pub rotation: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        let log_dir = dirs::data_local_dir()
            .map(|dir| dir.join("FogControl").join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"));
        Self {
            level: "info".to_string(),
            file_logging_enabled: true,
            console_logging_enabled: true,
            log_dir,
            file_name_prefix: "fog_control".to_string(),
            show_file_line: false,
            show_target: true,
            ansi_colors: true,
            rotation: "daily".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_settings: LogSettings,

    // BLE profile. Intensity, duration and command share one UUID on the
    // shipped firmware; each can be pointed elsewhere independently.
    #[serde(default = "default_service_uuid")]
    pub ble_service_uuid: String,
    #[serde(default = "default_control_uuid")]
    pub ble_intensity_char_uuid: String,
    #[serde(default = "default_control_uuid")]
    pub ble_duration_char_uuid: String,
    #[serde(default = "default_control_uuid")]
    pub ble_command_char_uuid: String,
    #[serde(default = "default_battery_uuid")]
    pub ble_battery_char_uuid: String,
    #[serde(default = "default_power_source_uuid")]
    pub ble_power_source_char_uuid: String,

    /// How long discovery listens for advertisements.
    #[serde(default = "default_scan_duration_secs")]
    pub scan_duration_secs: u64,

    /// Idle time before every connection is dropped.
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,

    /// Whether the user allowed notifications; alerts are dropped otherwise.
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,

    /// Overrides the default storage file location.
    #[serde(default)]
    pub storage_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_settings: LogSettings::default(),
            ble_service_uuid: default_service_uuid(),
            ble_intensity_char_uuid: default_control_uuid(),
            ble_duration_char_uuid: default_control_uuid(),
            ble_command_char_uuid: default_control_uuid(),
            ble_battery_char_uuid: default_battery_uuid(),
            ble_power_source_char_uuid: default_power_source_uuid(),
            scan_duration_secs: default_scan_duration_secs(),
            inactivity_timeout_secs: default_inactivity_timeout_secs(),
            notifications_enabled: default_true(),
            storage_path: None,
        }
    }
}

fn default_service_uuid() -> String {
    "0000ffff-0000-1000-8000-00805f9b34fb".to_string()
}
fn default_control_uuid() -> String {
    "0000ffff-0000-1000-8000-00805f9b34fb".to_string()
}
fn default_battery_uuid() -> String {
    "00002a19-0000-1000-8000-00805f9b34fb".to_string()
}
fn default_power_source_uuid() -> String {
    "0000ff04-0000-1000-8000-00805f9b34fb".to_string()
}
fn default_scan_duration_secs() -> u64 {
    5
}
fn default_inactivity_timeout_secs() -> u64 {
    300
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::with_path(settings_path))
    }

    /// Load from an explicit file, falling back to defaults.
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("FogControl");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "inactivity_timeout_secs": 60 }"#).unwrap();

        let service = SettingsService::with_path(path);
        let s = service.get();
        assert_eq!(s.inactivity_timeout_secs, 60);
        assert_eq!(s.scan_duration_secs, 5);
        assert_eq!(s.ble_battery_char_uuid, "00002a19-0000-1000-8000-00805f9b34fb");
        assert_eq!(s.log_settings.file_name_prefix, "fog_control");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut service = SettingsService::with_path(path.clone());
        service.get_mut().notifications_enabled = false;
        service.save().unwrap();

        assert!(!SettingsService::with_path(path).get().notifications_enabled);
    }
}
