//! Store trait and change notification types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use chatlog_core::Result;

/// Capacity of the change notification channel per store.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// One key's transition, emitted after the store commits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageChange {
    pub key: String,
    #[serde(rename = "oldValue", skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    /// `None` when the key was removed.
    #[serde(rename = "newValue", skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

impl StorageChange {
    pub fn is_removal_of(&self, key: &str) -> bool {
        self.key == key && self.new_value.is_none()
    }
}

/// Key-value persistence with change notifications.
pub trait KvStore: Send + Sync {
    /// Read a single key.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write several keys in one commit.
    fn set(&self, entries: Vec<(String, Value)>) -> Result<()>;

    /// Remove keys. Missing keys are ignored and produce no notification.
    fn remove(&self, keys: &[&str]) -> Result<()>;

    /// Subscribe to changes committed after this call.
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

/// Apply a write to `entries`, returning the resulting notifications.
/// Keys rewritten with an identical value produce none.
pub(crate) fn apply_set(
    entries: &mut HashMap<String, Value>,
    updates: Vec<(String, Value)>,
) -> Vec<StorageChange> {
    updates
        .into_iter()
        .filter_map(|(key, value)| {
            if entries.get(&key) == Some(&value) {
                return None;
            }
            let old_value = entries.insert(key.clone(), value.clone());
            Some(StorageChange {
                key,
                old_value,
                new_value: Some(value),
            })
        })
        .collect()
}

/// Apply a removal to `entries`, returning the resulting notifications.
pub(crate) fn apply_remove(entries: &mut HashMap<String, Value>, keys: &[&str]) -> Vec<StorageChange> {
    keys.iter()
        .filter_map(|key| {
            entries.remove(*key).map(|old| StorageChange {
                key: key.to_string(),
                old_value: Some(old),
                new_value: None,
            })
        })
        .collect()
}

pub(crate) fn notify(tx: &broadcast::Sender<StorageChange>, changes: Vec<StorageChange>) {
    for change in changes {
        // No subscribers is fine.
        let _ = tx.send(change);
    }
}
