//! # State Storage
//!
//! JSON-file persistence for the terminal's small amount of durable state,
//! most importantly the recent port configurations remembered by the
//! configuration wizard.
//!
//! ## Features
//!
//! - A single pretty-printed JSON document per state file
//! - Key/value access through the [`StateStore`] trait, so the session
//!   bridge never touches the file system directly
//! - Thread-safe operations with async mutex protection
//! - Parent directories created on first write
//!
//! ## Data Structure
//!
//! The state file contains:
//! - **values**: Key-value pairs, e.g. `recentPortSettings`
//! - **timestamp**: Unix timestamp of the last modification
//!
//! ## Example
//!
//! ```rust,no_run
//! use serial_terminal_lib::storage::JsonStateStore;
//! use sterm_serial::serial::StateStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = JsonStateStore::open("state.json").await?;
//! store.set("recentPortSettings", serde_json::json!([])).await?;
//! assert!(store.get("recentPortSettings").await?.is_some());
//! # Ok(())
//! # }
//! ```

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use sterm_serial::serial::{SerialError, SerialResult, StateStore};
use tokio::sync::Mutex;

/// Everything persisted in the state file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateData {
    /// Stored values keyed by name
    #[serde(default)]
    pub values: HashMap<String, Value>,
    /// Unix timestamp indicating when the data was last modified
    #[serde(default)]
    pub timestamp: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// File-backed [`StateStore`].
///
/// The whole document is held in memory and rewritten on every `set`.
/// Reads never touch the disk after [`JsonStateStore::open`].
pub struct JsonStateStore {
    /// File path where state is stored
    path: PathBuf,
    data: Mutex<StateData>,
}

impl JsonStateStore {
    /// Opens the state file at `path`.
    ///
    /// A missing file is not an error: the store starts empty and the file
    /// is created on the first write.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if the file exists but cannot be read
    /// or does not contain a valid state document.
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text).map_err(|e| AppError::Storage {
                path: path.clone(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no state file at {}, starting empty", path.display());
                StateData::default()
            }
            Err(e) => {
                return Err(AppError::Storage {
                    path,
                    message: e.to_string(),
                })
            }
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the in-memory document.
    pub async fn data(&self) -> StateData {
        self.data.lock().await.clone()
    }

    /// Writes `data` to the state file.
    ///
    /// # Errors
    ///
    /// Returns a storage error if serialization fails or the file (or its
    /// parent directory) cannot be written.
    async fn write(&self, data: &StateData) -> SerialResult<()> {
        let json = serde_json::to_string_pretty(data)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SerialError::storage(format!("{}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| SerialError::storage(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait::async_trait]
impl StateStore for JsonStateStore {
    async fn get(&self, key: &str) -> SerialResult<Option<Value>> {
        Ok(self.data.lock().await.values.get(key).cloned())
    }

    /// Stores `value` under `key` and rewrites the file.  The in-memory
    /// document is only updated once the write succeeded.
    async fn set(&self, key: &str, value: Value) -> SerialResult<()> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        next.values.insert(key.to_string(), value);
        next.timestamp = now_secs();
        self.write(&next).await?;
        *data = next;
        Ok(())
    }
}
