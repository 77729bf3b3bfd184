use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Number of device cards the application manages.
pub const MAX_DEVICES: usize = 4;

/// Upper bound on commands buffered across the whole registry.
pub const COMMAND_QUEUE_LIMIT: usize = 50;

/// Application version written to storage on every start.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Where a device currently draws power from.
///
/// Stored and transmitted as the firmware's single-byte code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum PowerSource {
    Battery,
    Ac,
    Usb,
    Unknown,
}

impl PowerSource {
    pub fn from_wire(code: u8) -> Self {
        match code {
            0 => Self::Battery,
            1 => Self::Ac,
            2 => Self::Usb,
            _ => Self::Unknown,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::Battery => 0,
            Self::Ac => 1,
            Self::Usb => 2,
            Self::Unknown => 0xFF,
        }
    }

    /// Name used inside sentences ("On USB power").
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Battery => "battery",
            Self::Ac => "AC",
            Self::Usb => "USB",
            Self::Unknown => "unknown",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Battery => "Battery",
            Self::Ac => "AC Power",
            Self::Usb => "USB Power",
            Self::Unknown => "Unknown Power",
        }
    }
}

impl From<u8> for PowerSource {
    fn from(code: u8) -> Self {
        Self::from_wire(code)
    }
}

impl From<PowerSource> for u8 {
    fn from(source: PowerSource) -> Self {
        source.to_wire()
    }
}

/// Coarse battery bucket used by front ends for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryBand {
    Low,
    Medium,
    High,
}

impl BatteryBand {
    pub fn from_level(level: u8) -> Self {
        if level < 20 {
            Self::Low
        } else if level < 50 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// One device card. Unpaired slots hold placeholder records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub paired: bool,
    /// Mirrors the live connection map; never trusted from storage.
    #[serde(default, skip_serializing)]
    pub connected: bool,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub last_seen: Option<u64>,
    #[serde(default)]
    pub battery_level: u8,
    #[serde(default)]
    pub power_source: Option<PowerSource>,
    /// Older builds kept a per-card queue here. Carried through untouched;
    /// pending commands live in the registry-wide [`QueuedCommand`] list.
    #[serde(default)]
    pub queue: Vec<serde_json::Value>,
}

impl DeviceRecord {
    /// Fresh unpaired record for a slot.
    pub fn placeholder(index: usize) -> Self {
        Self {
            id: format!("device-{}", index),
            name: format!("Fog Device {}", index + 1),
            index,
            paired: false,
            connected: false,
            last_seen: None,
            battery_level: 0,
            power_source: None,
            queue: Vec::new(),
        }
    }

    pub fn battery_band(&self) -> BatteryBand {
        BatteryBand::from_level(self.battery_level)
    }
}

/// Per-slot connection lifecycle as seen by front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unpaired,
    Disconnected,
    Connecting,
    Connected,
}

/// What a buffered command does once delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Intensity,
    Duration,
    #[serde(alias = "command")]
    Start,
}

/// A command value exactly as the user supplied it.
///
/// Values are validated at delivery time, so the raw form is kept until then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(i64),
    Text(String),
}

impl RawValue {
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Number(n) => Cow::Owned(n.to_string()),
            Self::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }
}

impl Default for RawValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A command waiting for its device to become reachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedCommand {
    #[serde(rename = "deviceIndex")]
    pub slot: usize,
    #[serde(rename = "type")]
    pub kind: CommandKind,
    pub value: RawValue,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "timestamp")]
    pub enqueued_at: u64,
}

/// Values the user has entered for the next session on a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInputs {
    pub intensity: RawValue,
    pub duration: RawValue,
}

impl Default for SessionInputs {
    fn default() -> Self {
        Self {
            intensity: RawValue::Number(2),
            duration: RawValue::default(),
        }
    }
}

/// User-facing alert raised by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub body: String,
}

impl Alert {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Events the core emits towards the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A slot's record or connection state changed; re-read it.
    DeviceChanged(usize),
    Alert(Alert),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_source_codes() {
        assert_eq!(PowerSource::from_wire(0), PowerSource::Battery);
        assert_eq!(PowerSource::from_wire(1), PowerSource::Ac);
        assert_eq!(PowerSource::from_wire(2), PowerSource::Usb);
        assert_eq!(PowerSource::from_wire(7), PowerSource::Unknown);
        assert_eq!(PowerSource::Usb.display_name(), "USB Power");
    }

    #[test]
    fn test_record_serialization_drops_connected() {
        let mut record = DeviceRecord::placeholder(2);
        record.connected = true;
        record.power_source = Some(PowerSource::Ac);

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("connected").is_none());
        assert_eq!(json["powerSource"], 1);
        assert_eq!(json["name"], "Fog Device 3");

        let restored: DeviceRecord = serde_json::from_value(json).unwrap();
        assert!(!restored.connected);
        assert_eq!(restored.power_source, Some(PowerSource::Ac));
    }

    #[test]
    fn test_record_keeps_legacy_queue_blob() {
        let json = serde_json::json!({
            "id": "AA",
            "name": "Stage",
            "index": 0,
            "paired": true,
            "queue": [{"type": "intensity", "value": 2}],
        });
        let record: DeviceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.queue.len(), 1);

        let saved = serde_json::to_value(&record).unwrap();
        assert_eq!(saved["queue"][0]["value"], 2);
        assert!(DeviceRecord::placeholder(0).queue.is_empty());
    }

    #[test]
    fn test_queued_command_accepts_legacy_shape() {
        let json = serde_json::json!({
            "deviceIndex": 1,
            "type": "command",
            "value": 1,
            "timestamp": 1700000000000u64,
        });
        let cmd: QueuedCommand = serde_json::from_value(json).unwrap();
        assert_eq!(cmd.kind, CommandKind::Start);
        assert_eq!(cmd.value, RawValue::Number(1));

        let json = serde_json::json!({
            "deviceIndex": 0,
            "type": "intensity",
            "value": "3",
            "timestamp": 5,
        });
        let cmd: QueuedCommand = serde_json::from_value(json).unwrap();
        assert_eq!(cmd.value.as_text(), "3");
    }

    #[test]
    fn test_battery_band() {
        assert_eq!(BatteryBand::from_level(19), BatteryBand::Low);
        assert_eq!(BatteryBand::from_level(20), BatteryBand::Medium);
        assert_eq!(BatteryBand::from_level(50), BatteryBand::High);
    }
}
