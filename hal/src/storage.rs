//! Local list storage
//!
//! Small synchronous key -> list store used to persist the audit log
//! between runs.

use crate::{HalError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Persistent key/list store
pub trait ListStore: Send {
    /// Read the list stored under `key`; a missing key is an empty list
    fn get_list(&self, key: &str) -> Result<Vec<Value>>;

    /// Replace the list stored under `key`
    fn set_list(&mut self, key: &str, items: &[Value]) -> Result<()>;

    /// Remove `key` entirely
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// One JSON array file per key under a base directory
pub struct JsonFileStore {
    base_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(base_path: &Path) -> Result<Self> {
        fs::create_dir_all(base_path)?;

        Ok(Self {
            base_path: base_path.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(HalError::InvalidConfig(format!("invalid storage key: {:?}", key)));
        }
        Ok(self.base_path.join(format!("{}.json", key)))
    }
}

impl ListStore for JsonFileStore {
    fn get_list(&self, key: &str) -> Result<Vec<Value>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn set_list(&mut self, key: &str, items: &[Value]) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, serde_json::to_vec(items)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store, for tests and replay runs
#[derive(Default)]
pub struct MemoryStore {
    lists: HashMap<String, Vec<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ListStore for MemoryStore {
    fn get_list(&self, key: &str) -> Result<Vec<Value>> {
        Ok(self.lists.get(key).cloned().unwrap_or_default())
    }

    fn set_list(&mut self, key: &str, items: &[Value]) -> Result<()> {
        self.lists.insert(key.to_string(), items.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.lists.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_store_round_trips_lists() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path()).unwrap();

        assert!(store.get_list("vigil_data_logs").unwrap().is_empty());

        let items = vec![json!({"animal": "Lion"}), json!({"animal": "None"})];
        store.set_list("vigil_data_logs", &items).unwrap();
        assert_eq!(store.get_list("vigil_data_logs").unwrap(), items);

        store.remove("vigil_data_logs").unwrap();
        assert!(store.get_list("vigil_data_logs").unwrap().is_empty());
        store.remove("vigil_data_logs").unwrap();
    }

    #[test]
    fn file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path()).unwrap();

        assert!(matches!(
            store.set_list("../escape", &[]),
            Err(HalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn file_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logs.json"), "{not json").unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();

        assert!(matches!(
            store.get_list("logs"),
            Err(HalError::Serialization(_))
        ));
    }

    #[test]
    fn memory_store_keeps_keys_apart() {
        let mut store = MemoryStore::new();
        store.set_list("a", &[json!(1)]).unwrap();
        store.set_list("b", &[json!(2), json!(3)]).unwrap();

        assert_eq!(store.get_list("a").unwrap(), vec![json!(1)]);
        assert_eq!(store.get_list("b").unwrap().len(), 2);
    }
}
