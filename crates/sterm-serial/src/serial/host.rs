//! Host-side seams: the terminal display surface, the host shell (context
//! flag and save dialog), and the persisted key/value state store.

use crate::serial::error::SerialResult;
use crate::serial::types::DisplayMessage;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// The terminal surface the bridge renders into.
pub trait DisplaySurface: Send + Sync {
    fn post(&self, message: DisplayMessage);
}

/// The application hosting the bridge.
#[async_trait::async_trait]
pub trait HostShell: Send + Sync {
    /// Host-visible "a serial session is running" flag.
    fn set_running(&self, running: bool);

    /// Ask the user where to save the log.  `None` = dialog cancelled.
    async fn show_save_dialog(&self, suggested_name: &str) -> Option<PathBuf>;
}

/// Host-provided persistent key/value store.
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> SerialResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> SerialResult<()>;
}

/// In-memory store; nothing survives the process.
#[derive(Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value directly (e.g. legacy-shaped data in tests).
    pub fn with_value(self, key: &str, value: Value) -> Self {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value);
        }
        self
    }

    pub fn snapshot(&self, key: &str) -> Option<Value> {
        self.values.lock().ok().and_then(|v| v.get(key).cloned())
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> SerialResult<Option<Value>> {
        Ok(self.snapshot(key))
    }

    async fn set(&self, key: &str, value: Value) -> SerialResult<()> {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStateStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", serde_json::json!([1, 2])).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(serde_json::json!([1, 2])));
    }
}
