//! Recently used port configurations.
//!
//! Persisted under [`RECENT_CONFIGS_KEY`] as a JSON array, newest first.
//! Older installs stored a single configuration object under the same key;
//! that shape is read back as a one-entry list.

use crate::serial::error::SerialResult;
use crate::serial::host::StateStore;
use crate::serial::types::{DataBits, PortConfig, StopBits};
use serde_json::Value;

pub const RECENT_CONFIGS_KEY: &str = "recentPortSettings";

/// Maximum number of remembered configurations.
pub const MAX_RECENT_CONFIGS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentConfigs {
    entries: Vec<PortConfig>,
}

impl RecentConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list already in newest-first order.
    pub fn from_entries(entries: Vec<PortConfig>) -> Self {
        let mut recent = Self::new();
        for config in entries.into_iter().rev() {
            recent.push(config);
        }
        recent
    }

    pub fn entries(&self) -> &[PortConfig] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Record `config` as the newest entry.  An identical older entry is
    /// dropped first; the oldest entries fall off past the limit.
    pub fn push(&mut self, config: PortConfig) {
        self.entries.retain(|c| *c != config);
        self.entries.insert(0, config);
        self.entries.truncate(MAX_RECENT_CONFIGS);
    }

    /// Interpret a stored value.  Out-of-range data or stop bits fall back
    /// to the defaults; entries without a path or otherwise unreadable are
    /// skipped.
    pub fn from_value(value: Value) -> Self {
        let items = match value {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            single @ Value::Object(_) => vec![single],
            other => {
                log::warn!("ignoring recent configurations of unexpected shape: {}", other);
                Vec::new()
            }
        };
        let entries = items
            .into_iter()
            .map(normalize_entry)
            .filter_map(|item| match serde_json::from_value::<PortConfig>(item) {
                Ok(config) if config.path.trim().is_empty() => {
                    log::warn!("skipping recent configuration without a port path");
                    None
                }
                Ok(config) => Some(config),
                Err(e) => {
                    log::warn!("skipping unreadable recent configuration: {}", e);
                    None
                }
            })
            .collect();
        Self::from_entries(entries)
    }

    pub fn to_value(&self) -> SerialResult<Value> {
        Ok(serde_json::to_value(&self.entries)?)
    }

    /// Load from the host store.  A store failure yields an empty list.
    pub async fn load(store: &dyn StateStore) -> Self {
        match store.get(RECENT_CONFIGS_KEY).await {
            Ok(Some(value)) => Self::from_value(value),
            Ok(None) => Self::new(),
            Err(e) => {
                log::warn!("could not read recent configurations: {}", e);
                Self::new()
            }
        }
    }

    pub async fn persist(&self, store: &dyn StateStore) -> SerialResult<()> {
        store.set(RECENT_CONFIGS_KEY, self.to_value()?).await
    }
}

/// Replace bit counts the port model cannot hold with the defaults.
fn normalize_entry(mut item: Value) -> Value {
    if let Value::Object(fields) = &mut item {
        let data_bits = fields.get("dataBits").and_then(Value::as_u64);
        if data_bits.and_then(|v| u8::try_from(v).ok()).and_then(DataBits::from_value).is_none() {
            fields.insert("dataBits".into(), DataBits::default().value().into());
        }
        let stop_bits = fields.get("stopBits").and_then(Value::as_u64);
        if stop_bits.and_then(|v| u8::try_from(v).ok()).and_then(|v| StopBits::try_from(v).ok()).is_none() {
            fields.insert("stopBits".into(), StopBits::default().value().into());
        }
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::host::MemoryStateStore;
    use crate::serial::types::{DataBits, Parity, StopBits};
    use serde_json::json;

    fn cfg(path: &str) -> PortConfig {
        PortConfig::new(path, 9600)
    }

    #[test]
    fn test_push_orders_newest_first_and_bounds() {
        let mut recent = RecentConfigs::new();
        for p in ["a", "b", "c", "d"] {
            recent.push(cfg(p));
        }
        let paths: Vec<&str> = recent.entries().iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["d", "c", "b"]);
    }

    #[test]
    fn test_push_moves_duplicate_to_front() {
        let mut recent = RecentConfigs::from_entries(vec![cfg("a"), cfg("b"), cfg("c")]);
        recent.push(cfg("c"));
        let paths: Vec<&str> = recent.entries().iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_same_path_different_settings_are_distinct() {
        let mut recent = RecentConfigs::new();
        recent.push(cfg("a"));
        let mut odd = cfg("a");
        odd.parity = Parity::Odd;
        recent.push(odd);
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_legacy_single_object() {
        let legacy = json!({"path": "COM3", "baudRate": "115200", "dataBits": 8, "parity": "none", "stopBits": 1});
        let recent = RecentConfigs::from_value(legacy);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent.entries()[0].path, "COM3");
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let value = json!([
            {"path": "COM1", "baudRate": 9600, "dataBits": 8, "parity": "none", "stopBits": 1},
            {"baudRate": 9600, "dataBits": 8, "parity": "none", "stopBits": 1},
            {"path": "COM2", "baudRate": 9600, "parity": "sideways"},
            "garbage"
        ]);
        let recent = RecentConfigs::from_value(value);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent.entries()[0].path, "COM1");
        assert!(RecentConfigs::from_value(json!(42)).is_empty());
    }

    #[test]
    fn test_legacy_object_with_out_of_range_bits_uses_defaults() {
        let legacy = json!({"path": "COM3", "baudRate": "115200", "dataBits": 8, "parity": "none", "stopBits": 8});
        let recent = RecentConfigs::from_value(legacy);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent.entries()[0].stop_bits, StopBits::One);
        assert_eq!(recent.entries()[0].data_bits, DataBits::Eight);

        let value = json!([{"path": "COM4", "baudRate": 9600, "dataBits": 9, "parity": "even"}]);
        let recent = RecentConfigs::from_value(value);
        assert_eq!(recent.entries()[0].shorthand(), "9600-8E1");
    }

    #[test]
    fn test_blank_path_entries_skipped() {
        let value = json!([
            {"path": "", "baudRate": 9600, "dataBits": 8, "parity": "none", "stopBits": 1},
            {"path": "  ", "baudRate": 9600},
            {"path": "COM5", "baudRate": 9600}
        ]);
        let recent = RecentConfigs::from_value(value);
        let paths: Vec<&str> = recent.entries().iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["COM5"]);
    }

    #[tokio::test]
    async fn test_persist_and_load() {
        let store = MemoryStateStore::new();
        assert!(RecentConfigs::load(&store).await.is_empty());

        let recent = RecentConfigs::from_entries(vec![cfg("x"), cfg("y")]);
        recent.persist(&store).await.unwrap();
        assert!(store.snapshot(RECENT_CONFIGS_KEY).unwrap().is_array());
        assert_eq!(RecentConfigs::load(&store).await, recent);
    }
}
