//! Line-oriented command console
//!
//! Slots are numbered from 1 on the console and from 0 everywhere else.

use crate::domain::controller::Controller;
use crate::domain::models::{CommandKind, ConnectionState, RawValue, MAX_DEVICES};
use crate::domain::stats::{format_countdown, format_runtime};
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  list                          show all device slots
  pair <slot>                   choose a new device for a slot
  connect <slot>                reconnect a slot's device
  rename <slot> <name>          rename a slot
  intensity <slot> <1-4>        set the next session's intensity
  duration <slot> <seconds>     set the next session's duration
  send <slot> <kind> [value]    send intensity, duration or start right away
  start <slot>                  start a session with the slot's settings
  stop <slot>                   emergency stop
  remove <slot>                 unpair a slot
  preset <slot>                 save the slot's settings as its preset
  stats <slot>                  show usage statistics
  start-all | stop-all          act on every connected slot
  disconnect-all                close every connection
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    Help,
    List,
    Pair(usize),
    Connect(usize),
    Rename(usize, String),
    SetIntensity(usize, RawValue),
    SetDuration(usize, RawValue),
    Send(usize, CommandKind, RawValue),
    Start(usize),
    Stop(usize),
    Remove(usize),
    SavePreset(usize),
    Stats(usize),
    StartAll,
    StopAll,
    DisconnectAll,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown command '{0}'")]
    Unknown(String),
    #[error("Missing {0}")]
    Missing(&'static str),
    #[error("Slot must be a number from 1 to 4, got '{0}'")]
    BadSlot(String),
    #[error("Unknown command kind '{0}', expected intensity, duration or start")]
    BadKind(String),
}

impl UiCommand {
    /// Returns `Ok(None)` for blank lines.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };

        let command = match verb.to_lowercase().as_str() {
            "help" | "?" => Self::Help,
            "list" | "ls" => Self::List,
            "pair" => Self::Pair(slot(words.next())?),
            "connect" => Self::Connect(slot(words.next())?),
            "rename" => {
                let slot = slot(words.next())?;
                let name = words.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    return Err(ParseError::Missing("name"));
                }
                Self::Rename(slot, name)
            }
            "intensity" => Self::SetIntensity(slot(words.next())?, value(words.next())?),
            "duration" => Self::SetDuration(slot(words.next())?, value(words.next())?),
            "send" => {
                let slot = slot(words.next())?;
                let kind = words.next().ok_or(ParseError::Missing("command kind"))?;
                match kind.to_lowercase().as_str() {
                    "intensity" => Self::Send(slot, CommandKind::Intensity, value(words.next())?),
                    "duration" => Self::Send(slot, CommandKind::Duration, value(words.next())?),
                    "start" => Self::Send(slot, CommandKind::Start, RawValue::Number(1)),
                    _ => return Err(ParseError::BadKind(kind.to_string())),
                }
            }
            "start" => Self::Start(slot(words.next())?),
            "stop" => Self::Stop(slot(words.next())?),
            "remove" | "unpair" => Self::Remove(slot(words.next())?),
            "preset" => Self::SavePreset(slot(words.next())?),
            "stats" => Self::Stats(slot(words.next())?),
            "start-all" => Self::StartAll,
            "stop-all" => Self::StopAll,
            "disconnect-all" => Self::DisconnectAll,
            "quit" | "exit" => Self::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn slot(word: Option<&str>) -> Result<usize, ParseError> {
    let word = word.ok_or(ParseError::Missing("slot"))?;
    match word.parse::<usize>() {
        Ok(n) if (1..=MAX_DEVICES).contains(&n) => Ok(n - 1),
        _ => Err(ParseError::BadSlot(word.to_string())),
    }
}

/// Values are passed through raw; the validator clamps them on delivery.
fn value(word: Option<&str>) -> Result<RawValue, ParseError> {
    word.map(RawValue::from).ok_or(ParseError::Missing("value"))
}

fn state_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Unpaired => "not paired",
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting...",
        ConnectionState::Connected => "connected",
    }
}

/// One status line for a slot.
pub fn describe(controller: &Controller, slot: usize) -> Option<String> {
    let record = controller.device(slot)?;
    let state = controller.connection_state(slot)?;
    let mut line = format!("[{}] {:<20} {}", slot + 1, record.name, state_label(state));

    if record.paired {
        line.push_str(&format!(
            "  battery {}% ({:?})",
            record.battery_level,
            record.battery_band()
        ));
        if let Some(source) = record.power_source {
            line.push_str(&format!("  {}", source.display_name()));
        }
    }
    if let Some(inputs) = controller.inputs(slot) {
        line.push_str(&format!(
            "  next: intensity {} duration {}",
            inputs.intensity, inputs.duration
        ));
    }
    let queued = controller.queued_for(slot);
    if queued > 0 {
        line.push_str(&format!("  {} queued", queued));
    }
    if let Some(secs) = controller.countdown_secs(slot) {
        line.push_str(&format!("  remaining {}", format_countdown(secs)));
    }
    Some(line)
}

pub fn describe_stats(controller: &Controller, slot: usize) -> String {
    let stats = controller.stats(slot);
    format!(
        "[{}] {} sessions, total runtime {}",
        slot + 1,
        stats.sessions,
        format_runtime(stats.total_seconds)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slot_commands() {
        assert_eq!(UiCommand::parse("pair 1"), Ok(Some(UiCommand::Pair(0))));
        assert_eq!(UiCommand::parse("  STOP 4 "), Ok(Some(UiCommand::Stop(3))));
        assert_eq!(
            UiCommand::parse("rename 2 Back  Stage"),
            Ok(Some(UiCommand::Rename(1, "Back Stage".to_string())))
        );
        assert_eq!(UiCommand::parse(""), Ok(None));
    }

    #[test]
    fn test_parse_values_stay_raw() {
        assert_eq!(
            UiCommand::parse("intensity 1 9"),
            Ok(Some(UiCommand::SetIntensity(0, RawValue::from("9"))))
        );
        assert_eq!(
            UiCommand::parse("send 3 duration 2m"),
            Ok(Some(UiCommand::Send(2, CommandKind::Duration, RawValue::from("2m"))))
        );
        assert_eq!(
            UiCommand::parse("send 3 start"),
            Ok(Some(UiCommand::Send(2, CommandKind::Start, RawValue::Number(1))))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(UiCommand::parse("pair"), Err(ParseError::Missing("slot")));
        assert_eq!(
            UiCommand::parse("pair 5"),
            Err(ParseError::BadSlot("5".to_string()))
        );
        assert_eq!(
            UiCommand::parse("pair 0"),
            Err(ParseError::BadSlot("0".to_string()))
        );
        assert_eq!(UiCommand::parse("rename 1"), Err(ParseError::Missing("name")));
        assert_eq!(
            UiCommand::parse("send 1 fog"),
            Err(ParseError::BadKind("fog".to_string()))
        );
        assert_eq!(
            UiCommand::parse("dance"),
            Err(ParseError::Unknown("dance".to_string()))
        );
    }
}
