//! Usage statistics and presets
//!
//! Per-slot counters and saved inputs live in storage under their own keys,
//! outside the registry blob.

use crate::domain::models::{RawValue, SessionInputs};
use crate::domain::validator;
use crate::infrastructure::storage::{
    preset_key, session_count_key, total_duration_key, Storage, StorageError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UsageStats {
    pub sessions: u64,
    pub total_seconds: u64,
}

impl UsageStats {
    pub fn load(storage: &dyn Storage, slot: usize) -> Self {
        Self {
            sessions: read_counter(storage.get(&session_count_key(slot))),
            total_seconds: read_counter(storage.get(&total_duration_key(slot))),
        }
    }

    /// Count one more session of `duration_secs` and store the totals.
    pub fn record_session(
        storage: &mut dyn Storage,
        slot: usize,
        duration_secs: u64,
    ) -> Result<Self, StorageError> {
        let mut stats = Self::load(storage, slot);
        stats.sessions += 1;
        stats.total_seconds += duration_secs;
        storage.set_many(vec![
            (session_count_key(slot), json!(stats.sessions)),
            (total_duration_key(slot), json!(stats.total_seconds)),
        ])?;
        Ok(stats)
    }
}

/// Counters were historically stored as strings; accept either form.
fn read_counter(value: Option<Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => validator::clamp(&s, 0, i64::MAX) as u64,
        _ => 0,
    }
}

pub fn format_runtime(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else {
        format!("{}m {}s", mins, secs)
    }
}

/// Session countdown display, "mm:ss".
pub fn format_countdown(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Saved intensity and duration for a slot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub intensity: Option<i64>,
    #[serde(default)]
    pub duration: Option<i64>,
}

impl Preset {
    /// Clamped snapshot of the current inputs.
    pub fn from_inputs(inputs: &SessionInputs) -> Self {
        Self {
            intensity: Some(i64::from(validator::intensity(&inputs.intensity))),
            duration: Some(i64::from(validator::duration_secs(&inputs.duration))),
        }
    }

    pub fn load(storage: &dyn Storage, slot: usize) -> Option<Self> {
        serde_json::from_value(storage.get(&preset_key(slot))?).ok()
    }

    pub fn save(&self, storage: &mut dyn Storage, slot: usize) -> Result<(), StorageError> {
        storage.set(&preset_key(slot), serde_json::to_value(self)?)
    }

    /// Overlay the saved values onto `inputs`; unset fields are left alone.
    pub fn apply_to(&self, inputs: &mut SessionInputs) {
        if let Some(intensity) = self.intensity {
            inputs.intensity = RawValue::Number(intensity);
        }
        if let Some(duration) = self.duration {
            inputs.duration = RawValue::Number(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::MemoryStorage;

    #[test]
    fn test_record_session_accumulates() {
        let mut storage = MemoryStorage::new();
        storage.insert(&session_count_key(1), json!("4"));

        UsageStats::record_session(&mut storage, 1, 90).unwrap();
        let stats = UsageStats::record_session(&mut storage, 1, 30).unwrap();
        assert_eq!(stats, UsageStats { sessions: 6, total_seconds: 120 });
        assert_eq!(UsageStats::load(&storage, 1), stats);
        assert_eq!(UsageStats::load(&storage, 0), UsageStats::default());
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_runtime(3723), "1h 2m 3s");
        assert_eq!(format_runtime(125), "2m 5s");
        assert_eq!(format_countdown(65), "01:05");
        assert_eq!(format_countdown(3600), "60:00");
    }

    #[test]
    fn test_preset_round_trip_through_inputs() {
        let mut storage = MemoryStorage::new();
        let inputs = SessionInputs {
            intensity: RawValue::from("9"),
            duration: RawValue::from("120"),
        };
        Preset::from_inputs(&inputs).save(&mut storage, 2).unwrap();

        let mut restored = SessionInputs::default();
        Preset::load(&storage, 2).unwrap().apply_to(&mut restored);
        assert_eq!(restored.intensity, RawValue::Number(4));
        assert_eq!(restored.duration, RawValue::Number(120));
        assert!(Preset::load(&storage, 3).is_none());
    }
}
