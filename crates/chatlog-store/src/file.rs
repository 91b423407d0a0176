//! JSON-file backed store. The whole key space lives in one document that is
//! rewritten on every commit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::types::*;
use chatlog_core::{Error, Result};

pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, Value>>,
    changes: broadcast::Sender<StorageChange>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing entries if the file exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entries = Self::load(&path);
        info!(
            "JsonFileStore initialized: {} keys, path={}",
            entries.len(),
            path.display()
        );

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> HashMap<String, Value> {
        match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                warn!("Discarding unreadable store {}: {}", path.display(), e);
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        }
    }

    fn write(&self, entries: &HashMap<String, Value>) -> Result<()> {
        let data = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, data)
            .map_err(|e| Error::Storage(format!("{}: {}", self.path.display(), e)))
    }

    /// Stage a mutation on a copy, persist it, then commit and notify.
    fn commit<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, Value>) -> Vec<StorageChange>,
    {
        let mut entries = self.entries.write();
        let mut staged = entries.clone();
        let changes = mutate(&mut staged);
        if changes.is_empty() {
            return Ok(());
        }
        self.write(&staged)?;
        *entries = staged;
        drop(entries);
        notify(&self.changes, changes);
        Ok(())
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, entries: Vec<(String, Value)>) -> Result<()> {
        self.commit(|staged| apply_set(staged, entries))
    }

    fn remove(&self, keys: &[&str]) -> Result<()> {
        self.commit(|staged| apply_remove(staged, keys))
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
