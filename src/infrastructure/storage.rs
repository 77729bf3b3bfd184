//! Persistent key-value storage
//!
//! JSON values under fixed keys. `FileStorage` keeps the whole store in one
//! file; `MemoryStorage` backs tests and headless runs without a data dir.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

pub const KEY_DEVICES: &str = "devices";
pub const KEY_COMMAND_QUEUE: &str = "commandQueue";
pub const KEY_APP_VERSION: &str = "appVersion";
pub const KEY_FIRST_RUN: &str = "firstRun";

pub fn session_count_key(slot: usize) -> String {
    format!("sessionCount-{}", slot)
}

pub fn total_duration_key(slot: usize) -> String {
    format!("totalDuration-{}", slot)
}

pub fn preset_key(slot: usize) -> String {
    format!("preset-{}", slot)
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Key-value persistence contract.
pub trait Storage: Send {
    fn get(&self, key: &str) -> Option<Value>;

    /// Write several keys at once; either all land or none do.
    fn set_many(&mut self, entries: Vec<(String, Value)>) -> Result<(), StorageError>;

    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError> {
        self.set_many(vec![(key.to_string(), value)])
    }
}

/// Whole-store JSON file, rewritten via temp file + rename on every write.
pub struct FileStorage {
    path: PathBuf,
    values: Map<String, Value>,
}

impl FileStorage {
    /// Open the store at `path`, starting empty if it is missing or corrupt.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let values = match Self::read_file(&path) {
            Ok(values) => values,
            Err(e) => {
                if path.exists() {
                    warn!("Ignoring unreadable storage file {}: {}", path.display(), e);
                }
                Map::new()
            }
        };

        debug!("Opened storage at {} ({} keys)", path.display(), values.len());
        Ok(Self { path, values })
    }

    /// `<data_dir>/FogControl/storage.json`
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        path.push("FogControl");
        path.push("storage.json");
        Ok(path)
    }

    fn read_file(path: &Path) -> Result<Map<String, Value>, StorageError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_file(&self, values: &Map<String, Value>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set_many(&mut self, entries: Vec<(String, Value)>) -> Result<(), StorageError> {
        let mut next = self.values.clone();
        for (key, value) in entries {
            next.insert(key, value);
        }
        self.write_file(&next)?;
        self.values = next;
        Ok(())
    }
}

/// In-memory store. Clones share the same contents.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    values: HashMap<String, Value>,
    failing: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, as a full quota would.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing = failing;
        }
    }

    pub fn insert(&self, key: &str, value: Value) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.values.insert(key.to_string(), value);
        }
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().ok()?.values.get(key).cloned()
    }

    fn set_many(&mut self, entries: Vec<(String, Value)>) -> Result<(), StorageError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StorageError::Unavailable("lock poisoned".to_string()))?;
        if inner.failing {
            return Err(StorageError::Unavailable("quota exceeded".to_string()));
        }
        for (key, value) in entries {
            inner.values.insert(key, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let mut storage = FileStorage::open(&path).unwrap();
        storage
            .set_many(vec![
                ("a".to_string(), json!(1)),
                ("b".to_string(), json!({"x": "y"})),
            ])
            .unwrap();

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get("a"), Some(json!(1)));
        assert_eq!(reopened.get("b"), Some(json!({"x": "y"})));
        assert_eq!(reopened.get("missing"), None);
    }

    #[test]
    fn test_file_storage_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{ not json").unwrap();

        let mut storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.get(KEY_DEVICES), None);
        storage.set(KEY_FIRST_RUN, json!("completed")).unwrap();
        assert_eq!(
            FileStorage::open(&path).unwrap().get(KEY_FIRST_RUN),
            Some(json!("completed"))
        );
    }

    #[test]
    fn test_memory_storage_failure_is_all_or_nothing() {
        let mut storage = MemoryStorage::new();
        storage.set("kept", json!(true)).unwrap();

        storage.set_failing(true);
        let result = storage.set_many(vec![
            ("kept".to_string(), json!(false)),
            ("new".to_string(), json!(1)),
        ]);
        assert!(result.is_err());
        assert_eq!(storage.get("kept"), Some(json!(true)));
        assert_eq!(storage.get("new"), None);
    }

    #[test]
    fn test_keys() {
        assert_eq!(session_count_key(2), "sessionCount-2");
        assert_eq!(total_duration_key(0), "totalDuration-0");
        assert_eq!(preset_key(3), "preset-3");
    }
}
