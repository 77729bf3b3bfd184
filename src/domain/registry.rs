//! Device Registry
//!
//! Exactly [`MAX_DEVICES`] records, one per slot, persisted together with the
//! command queue.

use crate::domain::models::{DeviceRecord, MAX_DEVICES};
use crate::domain::queue::CommandQueue;
use crate::infrastructure::storage::{Storage, StorageError, KEY_COMMAND_QUEUE, KEY_DEVICES};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    records: Vec<DeviceRecord>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    /// All slots as unpaired placeholders.
    pub fn new() -> Self {
        Self {
            records: (0..MAX_DEVICES).map(DeviceRecord::placeholder).collect(),
        }
    }

    /// Restore the registry from storage. Missing or malformed data falls back
    /// to placeholders.
    pub fn load(storage: &dyn Storage) -> Self {
        Self::from_value(storage.get(KEY_DEVICES))
    }

    pub fn from_value(value: Option<Value>) -> Self {
        let Some(value) = value else {
            return Self::new();
        };

        match serde_json::from_value::<Vec<DeviceRecord>>(value) {
            Ok(records) if records.len() == MAX_DEVICES => {
                let records = records
                    .into_iter()
                    .enumerate()
                    .map(|(index, mut record)| {
                        record.index = index;
                        record.connected = false;
                        if record.name.trim().is_empty() {
                            record.name = DeviceRecord::placeholder(index).name;
                        }
                        record
                    })
                    .collect();
                Self { records }
            }
            Ok(records) => {
                warn!(
                    "Stored registry has {} records, expected {}; using defaults",
                    records.len(),
                    MAX_DEVICES
                );
                Self::new()
            }
            Err(e) => {
                warn!("Stored registry is malformed ({}); using defaults", e);
                Self::new()
            }
        }
    }

    /// Write records and queue in a single storage call.
    pub fn save(&self, queue: &CommandQueue, storage: &mut dyn Storage) -> Result<(), StorageError> {
        let devices = serde_json::to_value(&self.records)?;
        let commands = serde_json::to_value(queue.entries())?;
        storage.set_many(vec![
            (KEY_DEVICES.to_string(), devices),
            (KEY_COMMAND_QUEUE.to_string(), commands),
        ])?;
        debug!("Persisted {} devices, {} queued commands", self.records.len(), queue.len());
        Ok(())
    }

    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    pub fn get(&self, slot: usize) -> Option<&DeviceRecord> {
        self.records.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut DeviceRecord> {
        self.records.get_mut(slot)
    }

    pub fn identity(&self, slot: usize) -> Option<&str> {
        self.records.get(slot).map(|r| r.id.as_str())
    }

    /// First slot holding `identity`.
    pub fn slot_of(&self, identity: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == identity)
    }

    /// Identities of all paired slots other than `slot`.
    pub fn paired_identities_except(&self, slot: usize) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.paired && r.index != slot)
            .map(|r| r.id.clone())
            .collect()
    }

    /// Returns false (and changes nothing) for blank names or unknown slots.
    pub fn rename(&mut self, slot: usize, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        match self.records.get_mut(slot) {
            Some(record) => {
                record.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Replace a slot with a fresh placeholder at the same index.
    pub fn reset(&mut self, slot: usize) -> Option<DeviceRecord> {
        let record = self.records.get_mut(slot)?;
        Some(std::mem::replace(record, DeviceRecord::placeholder(slot)))
    }

    pub fn adopt_connection(
        &mut self,
        slot: usize,
        identity: &str,
        display_name: Option<&str>,
        now_ms: u64,
    ) -> bool {
        let Some(record) = self.records.get_mut(slot) else {
            return false;
        };
        record.id = identity.to_string();
        if let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty()) {
            record.name = name.to_string();
        }
        record.paired = true;
        record.connected = true;
        record.last_seen = Some(now_ms);
        true
    }

    /// Recompute every `connected` flag from the live connection map.
    pub fn sync_connected(&mut self, is_live: impl Fn(&str) -> bool) {
        for record in &mut self.records {
            record.connected = is_live(&record.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CommandKind, RawValue};
    use crate::infrastructure::storage::MemoryStorage;
    use serde_json::json;

    #[test]
    fn test_load_defaults_when_absent() {
        let storage = MemoryStorage::new();
        let registry = DeviceRegistry::load(&storage);
        assert_eq!(registry.records().len(), MAX_DEVICES);
        assert_eq!(registry.identity(0), Some("device-0"));
        assert_eq!(registry.identity(3), Some("device-3"));
        assert!(registry.records().iter().all(|r| !r.paired && !r.connected));
    }

    #[test]
    fn test_load_defaults_when_malformed() {
        let storage = MemoryStorage::new();
        storage.insert(KEY_DEVICES, json!("garbage"));
        assert_eq!(DeviceRegistry::load(&storage).identity(1), Some("device-1"));

        storage.insert(KEY_DEVICES, json!([{"id": "a", "name": "A"}]));
        assert_eq!(DeviceRegistry::load(&storage).identity(0), Some("device-0"));
    }

    #[test]
    fn test_load_ignores_stored_connected_flag() {
        let storage = MemoryStorage::new();
        let mut records: Vec<Value> = (0..MAX_DEVICES)
            .map(|i| serde_json::to_value(DeviceRecord::placeholder(i)).unwrap())
            .collect();
        records[1] = json!({"id": "AA:BB", "name": "Den", "index": 7, "paired": true, "connected": true});
        storage.insert(KEY_DEVICES, Value::Array(records));

        let registry = DeviceRegistry::load(&storage);
        let record = registry.get(1).unwrap();
        assert_eq!(record.id, "AA:BB");
        assert_eq!(record.index, 1);
        assert!(record.paired);
        assert!(!record.connected);
    }

    #[test]
    fn test_rename_rejects_blank() {
        let mut registry = DeviceRegistry::new();
        assert!(!registry.rename(0, "   "));
        assert_eq!(registry.get(0).unwrap().name, "Fog Device 1");
        assert!(registry.rename(0, "  Bedroom "));
        assert_eq!(registry.get(0).unwrap().name, "Bedroom");
        assert!(!registry.rename(9, "Nowhere"));
    }

    #[test]
    fn test_adopt_and_reset_keep_slot_index() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.adopt_connection(2, "AA:BB", Some("Fogger"), 42));
        let record = registry.get(2).unwrap();
        assert_eq!((record.id.as_str(), record.name.as_str()), ("AA:BB", "Fogger"));
        assert!(record.paired && record.connected);
        assert_eq!(record.last_seen, Some(42));
        assert_eq!(registry.slot_of("AA:BB"), Some(2));

        let old = registry.reset(2).unwrap();
        assert_eq!(old.id, "AA:BB");
        assert_eq!(registry.get(2).unwrap(), &DeviceRecord::placeholder(2));
    }

    #[test]
    fn test_save_writes_devices_and_queue() {
        let mut storage = MemoryStorage::new();
        let registry = DeviceRegistry::new();
        let mut queue = CommandQueue::new();
        queue
            .enqueue(0, CommandKind::Intensity, RawValue::Number(3), 1)
            .unwrap();

        registry.save(&queue, &mut storage).unwrap();
        assert_eq!(storage.get(KEY_DEVICES).unwrap().as_array().unwrap().len(), MAX_DEVICES);
        assert_eq!(storage.get(KEY_COMMAND_QUEUE).unwrap().as_array().unwrap().len(), 1);

        storage.set_failing(true);
        assert!(registry.save(&CommandQueue::new(), &mut storage).is_err());
        assert_eq!(storage.get(KEY_COMMAND_QUEUE).unwrap().as_array().unwrap().len(), 1);
    }
}
