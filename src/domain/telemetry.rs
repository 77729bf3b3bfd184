//! Telemetry Policy
//!
//! Decides what a battery or power-source reading means for the user. The
//! policy only updates the record and reports what should happen; the
//! controller carries out alerts and the forced stop.

use crate::domain::models::{Alert, DeviceRecord, PowerSource};

/// Below this level the user is told to charge.
pub const LOW_BATTERY: u8 = 20;
/// Below this level on battery power the device is about to shut down.
pub const CRITICAL_BATTERY: u8 = 15;
/// Below this level on battery power the session is stopped.
pub const SHUTDOWN_BATTERY: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryEvent {
    Battery(u8),
    PowerSource(PowerSource),
}

/// Side effects requested by a telemetry reading.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TelemetryOutcome {
    pub alerts: Vec<Alert>,
    pub emergency_stop: bool,
}

/// Apply a change notification to `record`.
pub fn apply(record: &mut DeviceRecord, event: TelemetryEvent) -> TelemetryOutcome {
    match event {
        TelemetryEvent::PowerSource(source) => {
            record.power_source = Some(source);
            TelemetryOutcome {
                alerts: vec![power_alert(source)],
                emergency_stop: false,
            }
        }
        TelemetryEvent::Battery(level) => {
            record.battery_level = level.min(100);
            battery_outcome(record.battery_level, record.power_source)
        }
    }
}

/// Apply the value read right after connecting. A seeded power source is
/// stored silently. A seeded battery level only runs the critical and
/// shutdown bands; "Low Battery" is reserved for change notifications.
pub fn seed(record: &mut DeviceRecord, event: TelemetryEvent) -> TelemetryOutcome {
    match event {
        TelemetryEvent::PowerSource(source) => {
            record.power_source = Some(source);
            TelemetryOutcome::default()
        }
        TelemetryEvent::Battery(level) => {
            record.battery_level = level.min(100);
            critical_outcome(record.battery_level, record.power_source)
        }
    }
}

/// Each band is checked on its own; a reading can trip all three.
pub fn battery_outcome(level: u8, source: Option<PowerSource>) -> TelemetryOutcome {
    let mut outcome = critical_outcome(level, source);
    if level < LOW_BATTERY {
        outcome
            .alerts
            .insert(0, Alert::new("Low Battery", "Charge soon"));
    }
    outcome
}

fn critical_outcome(level: u8, source: Option<PowerSource>) -> TelemetryOutcome {
    let on_battery = source == Some(PowerSource::Battery);
    let mut outcome = TelemetryOutcome::default();

    if level < CRITICAL_BATTERY && on_battery {
        outcome
            .alerts
            .push(Alert::new("Critical Battery", "Device will shut down soon"));
    }
    if level < SHUTDOWN_BATTERY && on_battery {
        outcome.emergency_stop = true;
    }
    outcome
}

fn power_alert(source: PowerSource) -> Alert {
    Alert::new("Power Status", format!("On {} power", source.short_name()))
}
