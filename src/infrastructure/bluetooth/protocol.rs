//! Fog device protocol
//!
//! GATT identifiers and wire encodings for the fog/haptic firmware.

use crate::domain::settings::Settings;
use anyhow::{Context, Result};
use uuid::Uuid;

/// Primary service advertised by the device.
pub const SERVICE_UUID: &str = "0000ffff-0000-1000-8000-00805f9b34fb";

/// Shared control characteristic (intensity, duration and start/stop on current firmware).
pub const CONTROL_CHAR_UUID: &str = "0000ffff-0000-1000-8000-00805f9b34fb";

/// Standard Battery Level characteristic (0x2A19).
pub const BATTERY_LEVEL_CHAR_UUID: &str = "00002a19-0000-1000-8000-00805f9b34fb";

/// Vendor power-source characteristic.
pub const POWER_SOURCE_CHAR_UUID: &str = "0000ff04-0000-1000-8000-00805f9b34fb";

/// Command byte that starts a session.
pub const CMD_START: u8 = 1;
/// Command byte that stops a session immediately.
pub const CMD_STOP: u8 = 0;

/// Logical characteristic roles the controller needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicRole {
    Intensity,
    Duration,
    Command,
    BatteryLevel,
    PowerSource,
}

impl CharacteristicRole {
    pub fn label(self) -> &'static str {
        match self {
            Self::Intensity => "intensity",
            Self::Duration => "duration",
            Self::Command => "command",
            Self::BatteryLevel => "battery level",
            Self::PowerSource => "power source",
        }
    }
}

/// Resolved identifiers for one device model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BleProfile {
    pub service: Uuid,
    pub intensity: Uuid,
    pub duration: Uuid,
    pub command: Uuid,
    pub battery_level: Uuid,
    pub power_source: Uuid,
}

impl Default for BleProfile {
    fn default() -> Self {
        Self {
            service: Uuid::from_u128(0x0000ffff_0000_1000_8000_00805f9b34fb),
            intensity: Uuid::from_u128(0x0000ffff_0000_1000_8000_00805f9b34fb),
            duration: Uuid::from_u128(0x0000ffff_0000_1000_8000_00805f9b34fb),
            command: Uuid::from_u128(0x0000ffff_0000_1000_8000_00805f9b34fb),
            battery_level: Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb),
            power_source: Uuid::from_u128(0x0000ff04_0000_1000_8000_00805f9b34fb),
        }
    }
}

impl BleProfile {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            service: parse_uuid(&settings.ble_service_uuid)?,
            intensity: parse_uuid(&settings.ble_intensity_char_uuid)?,
            duration: parse_uuid(&settings.ble_duration_char_uuid)?,
            command: parse_uuid(&settings.ble_command_char_uuid)?,
            battery_level: parse_uuid(&settings.ble_battery_char_uuid)?,
            power_source: parse_uuid(&settings.ble_power_source_char_uuid)?,
        })
    }

    pub fn uuid_for(&self, role: CharacteristicRole) -> Uuid {
        match role {
            CharacteristicRole::Intensity => self.intensity,
            CharacteristicRole::Duration => self.duration,
            CharacteristicRole::Command => self.command,
            CharacteristicRole::BatteryLevel => self.battery_level,
            CharacteristicRole::PowerSource => self.power_source,
        }
    }
}

/// Parse a UUID string (hyphenated or bare hex)
pub fn parse_uuid(uuid_str: &str) -> Result<Uuid> {
    Uuid::parse_str(uuid_str.trim()).with_context(|| format!("Invalid UUID: {}", uuid_str))
}

/// Intensity is a single byte.
pub fn intensity_payload(level: u8) -> [u8; 1] {
    [level]
}

/// Duration is a little-endian u32 of seconds.
pub fn duration_payload(secs: u32) -> [u8; 4] {
    secs.to_le_bytes()
}

pub fn command_payload(command: u8) -> [u8; 1] {
    [command]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid() {
        let uuid = parse_uuid(SERVICE_UUID).unwrap();
        assert_eq!(uuid.as_u128() >> 96, 0x0000ffff);
        assert!(parse_uuid("not-a-uuid").is_err());
    }

    #[test]
    fn test_default_profile_matches_constants() {
        let profile = BleProfile::from_settings(&Settings::default()).unwrap();
        assert_eq!(profile, BleProfile::default());
        assert_eq!(profile.battery_level, parse_uuid(BATTERY_LEVEL_CHAR_UUID).unwrap());
        assert_eq!(profile.power_source, parse_uuid(POWER_SOURCE_CHAR_UUID).unwrap());
        assert_eq!(profile.command, parse_uuid(CONTROL_CHAR_UUID).unwrap());
    }

    #[test]
    fn test_profile_rejects_bad_uuid() {
        let mut settings = Settings::default();
        settings.ble_duration_char_uuid = "zzzz".to_string();
        assert!(BleProfile::from_settings(&settings).is_err());
    }

    #[test]
    fn test_payloads() {
        assert_eq!(intensity_payload(3), [3]);
        assert_eq!(duration_payload(3600), [0x10, 0x0E, 0x00, 0x00]);
        assert_eq!(command_payload(CMD_STOP), [0]);
    }
}
