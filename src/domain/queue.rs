//! Command Queue
//!
//! Registry-wide buffer of commands that could not be delivered. Entries are
//! addressed by slot; which device a slot means is looked up at drain time,
//! so re-pairing a slot redirects its pending commands.

use crate::domain::models::{CommandKind, QueuedCommand, RawValue, COMMAND_QUEUE_LIMIT};
use crate::domain::registry::DeviceRegistry;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("command queue is full ({limit} entries)")]
pub struct QueueFull {
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct CommandQueue {
    entries: Vec<QueuedCommand>,
    limit: usize,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::with_limit(COMMAND_QUEUE_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit,
        }
    }

    /// Restore from a stored value; anything unreadable yields an empty queue.
    /// Entries beyond the limit are dropped from the tail.
    pub fn from_value(value: Option<Value>) -> Self {
        let mut queue = Self::new();
        let Some(value) = value else {
            return queue;
        };
        match serde_json::from_value::<Vec<QueuedCommand>>(value) {
            Ok(mut entries) => {
                if entries.len() > queue.limit {
                    warn!(
                        "Stored queue has {} entries; keeping the first {}",
                        entries.len(),
                        queue.limit
                    );
                    entries.truncate(queue.limit);
                }
                queue.entries = entries;
            }
            Err(e) => warn!("Stored command queue is malformed ({}); starting empty", e),
        }
        queue
    }

    /// Append a command. A full queue rejects it; older entries are never evicted.
    pub fn enqueue(
        &mut self,
        slot: usize,
        kind: CommandKind,
        value: RawValue,
        now_ms: u64,
    ) -> Result<(), QueueFull> {
        if self.entries.len() >= self.limit {
            return Err(QueueFull { limit: self.limit });
        }
        self.entries.push(QueuedCommand {
            slot,
            kind,
            value,
            enqueued_at: now_ms,
        });
        Ok(())
    }

    pub fn entries(&self) -> &[QueuedCommand] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending entries for one slot, oldest first.
    pub fn for_slot(&self, slot: usize) -> impl Iterator<Item = &QueuedCommand> {
        self.entries.iter().filter(move |c| c.slot == slot)
    }

    /// Snapshot of entries whose slot currently maps to `identity`, in enqueue order.
    pub fn pending_for(&self, identity: &str, registry: &DeviceRegistry) -> Vec<QueuedCommand> {
        self.entries
            .iter()
            .filter(|c| registry.identity(c.slot) == Some(identity))
            .cloned()
            .collect()
    }

    /// Remove every entry whose slot maps to `identity` right now.
    pub fn purge_for(&mut self, identity: &str, registry: &DeviceRegistry) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|c| registry.identity(c.slot) != Some(identity));
        before - self.entries.len()
    }
}
