//! Key/value persistence for per-site dashboard preferences.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tracing::warn;

/// String storage for tab choices and the last-used period.
///
/// Writes are best effort: a store that cannot persist logs and carries on,
/// a lost preference must never break a report.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
}

/// `"<reportKind>Tab__<siteDomain>"`, e.g. `deviceTab__example.com`.
pub fn tab_key(report_kind: &str, domain: &str) -> String {
    format!("{report_kind}Tab__{domain}")
}

pub fn period_key(domain: &str) -> String {
    format!("period__{domain}")
}

/// Process-local store; preferences die with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }
}

/// Store backed by a single JSON object on disk.
///
/// The whole map is rewritten on every `set_item`. An unreadable or corrupt
/// file starts the store empty.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    items: RwLock<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let items = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt state file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "State file unreadable; starting empty");
                BTreeMap::new()
            }
        };
        Self {
            path,
            items: RwLock::new(items),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        let snapshot = {
            let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
            items.insert(key.to_string(), value.to_string());
            serde_json::to_string_pretty(&*items)
        };
        let written = snapshot
            .map_err(std::io::Error::from)
            .and_then(|json| std::fs::write(&self.path, json));
        if let Err(e) = written {
            warn!(path = %self.path.display(), key, error = %e, "Failed to persist preference");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_kind_and_site() {
        assert_eq!(tab_key("device", "example.com"), "deviceTab__example.com");
        assert_eq!(tab_key("geo", "example.com"), "geoTab__example.com");
        assert_eq!(period_key("example.com"), "period__example.com");
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        assert_eq!(store.get_item("a"), None);
        store.set_item("a", "1");
        store.set_item("a", "2");
        assert_eq!(store.get_item("a").as_deref(), Some("2"));
    }

    #[test]
    fn json_file_store_survives_reopen() {
        let path = std::env::temp_dir().join(format!(
            "statsboard-store-{}-{}.json",
            std::process::id(),
            line!()
        ));
        {
            let store = JsonFileStore::open(&path);
            store.set_item("geoTab__example.com", "cities");
        }
        let reopened = JsonFileStore::open(&path);
        assert_eq!(
            reopened.get_item("geoTab__example.com").as_deref(),
            Some("cities")
        );
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn json_file_store_tolerates_corrupt_file() {
        let path = std::env::temp_dir().join(format!(
            "statsboard-store-{}-{}.json",
            std::process::id(),
            line!()
        ));
        std::fs::write(&path, "not json").expect("write fixture");
        let store = JsonFileStore::open(&path);
        assert_eq!(store.get_item("anything"), None);
        std::fs::remove_file(&path).ok();
    }
}
