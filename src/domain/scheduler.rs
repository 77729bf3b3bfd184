//! Clock and timers
//!
//! Timers are plain deadlines checked on each tick instead of spawned sleeps,
//! so tests drive time with [`ManualClock`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Shared idle timer; expiry drops every connection.
    Inactivity,
    /// Display countdown for a running session on a slot.
    Countdown(usize),
}

#[derive(Debug, Default)]
pub struct Scheduler {
    deadlines: HashMap<TimerKey, u64>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to fire at `at_ms`, replacing any previous deadline.
    pub fn schedule(&mut self, key: TimerKey, at_ms: u64) {
        self.deadlines.insert(key, at_ms);
    }

    pub fn cancel(&mut self, key: TimerKey) -> bool {
        self.deadlines.remove(&key).is_some()
    }

    pub fn is_armed(&self, key: TimerKey) -> bool {
        self.deadlines.contains_key(&key)
    }

    pub fn remaining_ms(&self, key: TimerKey, now_ms: u64) -> Option<u64> {
        self.deadlines
            .get(&key)
            .map(|at_ms| at_ms.saturating_sub(now_ms))
    }

    /// Disarm and return every timer due at `now_ms`, earliest first.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<TimerKey> {
        let mut due: Vec<(u64, TimerKey)> = self
            .deadlines
            .iter()
            .filter(|(_, at_ms)| **at_ms <= now_ms)
            .map(|(key, at_ms)| (*at_ms, *key))
            .collect();
        due.sort_by_key(|(at, _)| *at);

        for (_, key) in &due {
            self.deadlines.remove(key);
        }
        due.into_iter().map(|(_, key)| key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_due_orders_and_disarms() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(TimerKey::Inactivity, 300);
        scheduler.schedule(TimerKey::Countdown(1), 100);
        scheduler.schedule(TimerKey::Countdown(2), 1_000);

        assert!(scheduler.take_due(50).is_empty());
        assert_eq!(
            scheduler.take_due(300),
            vec![TimerKey::Countdown(1), TimerKey::Inactivity]
        );
        assert!(!scheduler.is_armed(TimerKey::Inactivity));
        assert_eq!(scheduler.remaining_ms(TimerKey::Countdown(2), 400), Some(600));
    }

    #[test]
    fn test_rescheduling_replaces_deadline() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(TimerKey::Inactivity, 100);
        scheduler.schedule(TimerKey::Inactivity, 500);

        assert!(scheduler.take_due(200).is_empty());
        assert_eq!(scheduler.remaining_ms(TimerKey::Inactivity, 200), Some(300));
        assert!(scheduler.cancel(TimerKey::Inactivity));
        assert!(!scheduler.cancel(TimerKey::Inactivity));
        assert!(!scheduler.is_armed(TimerKey::Inactivity));
    }

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::new(10);
        let other = clock.clone();
        clock.advance(5);
        assert_eq!(other.now_ms(), 15);
    }
}
